// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The bake error taxonomy.

use super::BakeStage;
use std::path::PathBuf;
use thiserror::Error;

/// An error that halts a bake.
///
/// Every stage reports failures through this type. The orchestrator turns the
/// first one into a human-readable line in the session's error list and stops;
/// nothing is retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BakeError {
    /// A local input does not exist.
    #[error("Could not find {reference}")]
    SourceNotFound {
        /// The input reference as given by the requester.
        reference: String,
    },

    /// A remote input could not be fetched.
    #[error("Failed to download {reference}: {reason}")]
    DownloadFailed {
        /// The input reference as given by the requester.
        reference: String,
        /// Transport-level description of the failure.
        reason: String,
    },

    /// A file could not be created or written.
    #[error("Could not write {}: {reason}", path.display())]
    WriteFailed {
        /// The path that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        reason: String,
    },

    /// The input could not be turned into a geometry document.
    #[error("Failed to parse {reference}: {reason}")]
    ParseFailed {
        /// The input reference being parsed.
        reference: String,
        /// What was wrong with the document.
        reason: String,
    },

    /// A mesh or texture compressor reported failure.
    #[error("Failed to compress {subject}: {reason}")]
    CompressionFailed {
        /// What was being compressed (mesh name or texture file name).
        subject: String,
        /// The compressor's description of the failure.
        reason: String,
    },

    /// The requester cancelled the bake before the given stage started.
    #[error("Bake cancelled before {stage:?}")]
    Cancelled {
        /// The stage that did not run.
        stage: BakeStage,
    },

    /// Another bake of the same input is already running on this agent.
    #[error("A bake of {reference} is already in progress")]
    AlreadyInProgress {
        /// The input reference.
        reference: String,
    },
}

impl BakeError {
    /// Shorthand for a [`BakeError::WriteFailed`] built from an I/O error.
    pub fn write_failed(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        BakeError::WriteFailed {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    /// Shorthand for a [`BakeError::CompressionFailed`].
    pub fn compression_failed(subject: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        BakeError::CompressionFailed {
            subject: subject.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a [`BakeError::ParseFailed`].
    pub fn parse_failed(reference: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        BakeError::ParseFailed {
            reference: reference.into(),
            reason: reason.to_string(),
        }
    }
}

/// An error raised while encoding a node tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// A string or blob property does not fit the format's length field.
    #[error("Property {index} of node '{node}' is {len} bytes long, more than the {max} the format can store")]
    PropertyTooLarge {
        /// Name of the node carrying the property.
        node: String,
        /// Position of the property on the node.
        index: usize,
        /// Length of the property in bytes.
        len: usize,
        /// Largest length the format can store.
        max: usize,
    },
}

/// An error raised while decoding a baked binary tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The input does not start with the expected magic bytes.
    #[error("Invalid magic bytes; not a baked scene file")]
    InvalidMagic,
    /// The format version is not one this decoder understands.
    #[error("Unsupported format version {0}")]
    UnsupportedVersion(u32),
    /// The input ended in the middle of a record.
    #[error("Unexpected end of data at offset {0}")]
    UnexpectedEof(usize),
    /// A property carries a type tag outside the supported set.
    #[error("Unknown property type tag {tag:?} at offset {offset}")]
    UnknownPropertyType {
        /// The offending tag byte, as a char.
        tag: char,
        /// Where it was found.
        offset: usize,
    },
    /// A record's declared sizes or offsets are inconsistent.
    #[error("Corrupted record at offset {offset}: {reason}")]
    Corrupted {
        /// Where the record starts.
        offset: usize,
        /// What was inconsistent.
        reason: String,
    },
}
