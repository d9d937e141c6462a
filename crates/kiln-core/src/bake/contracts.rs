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

//! Capability traits for the pipeline's collaborators.
//!
//! The bake agent only ever talks to these traits, so alternate backends (or
//! test stubs) can be substituted for any of them.

use super::{AssetReference, BakeError, DecodeError, EncodeError};
use crate::geometry::{GeometryDocument, Mesh};
use crate::tree::Node;
use serde::Deserialize;
use std::path::Path;

/// Options forwarded to a [`GeometryIngestor`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IngestOptions {
    /// Split polygons with more than three vertices into triangles.
    pub triangulate: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self { triangulate: true }
    }
}

/// Turns raw mesh description bytes into a [`GeometryDocument`].
pub trait GeometryIngestor: Send + Sync {
    /// Parses `bytes`.
    ///
    /// When `combine_parts` is set, all objects of the source are merged into a
    /// single mesh with one part per object, and material libraries are read.
    /// `source` is the original reference, used to resolve sibling files.
    ///
    /// # Errors
    /// Returns [`BakeError::ParseFailed`] if the document is malformed.
    fn parse(
        &self,
        bytes: &[u8],
        options: &IngestOptions,
        combine_parts: bool,
        source: &AssetReference,
    ) -> Result<GeometryDocument, BakeError>;
}

/// Compresses a mesh into an opaque payload.
pub trait MeshCompressor: Send + Sync {
    /// Compresses `mesh`. `has_deformers` tells the compressor whether skinning
    /// data must be preserved.
    ///
    /// # Errors
    /// Returns [`BakeError::CompressionFailed`] on failure.
    fn compress(&self, mesh: &Mesh, has_deformers: bool) -> Result<Vec<u8>, BakeError>;
}

/// How a texture is sampled by the material that references it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureUsage {
    /// Base color.
    Albedo,
    /// Specular intensity.
    Specular,
}

/// Where a texture comes from and where its baked copy should go.
#[derive(Debug, Clone, Copy)]
pub struct TextureRequest<'a> {
    /// File name as referenced by the material, relative to `source_dir`.
    pub filename: &'a str,
    /// Directory the material's references are relative to.
    pub source_dir: &'a Path,
    /// Directory the re-encoded texture is written to.
    pub output_dir: &'a Path,
}

/// Re-encodes a texture for the baked output.
pub trait TextureCompressor: Send + Sync {
    /// Compresses the texture described by `request` and returns the new file
    /// name, relative to `request.output_dir`.
    ///
    /// `usage` is only called if compression actually proceeds.
    ///
    /// # Errors
    /// Returns [`BakeError::CompressionFailed`] if the texture cannot be read,
    /// decoded or written.
    fn compress(
        &self,
        request: &TextureRequest<'_>,
        usage: &dyn Fn() -> TextureUsage,
    ) -> Result<String, BakeError>;
}

/// Encodes a node tree into the baked binary format and back.
pub trait TreeSerializer: Send + Sync {
    /// File extension of the produced format, without the dot.
    fn format_extension(&self) -> &'static str;

    /// Encodes the children of `root`, in order. Pure and deterministic.
    ///
    /// # Errors
    /// Returns an [`EncodeError`] if a value does not fit the format.
    fn serialize(&self, root: &Node) -> Result<Vec<u8>, EncodeError>;

    /// Decodes bytes produced by [`serialize`](Self::serialize) into a root node.
    ///
    /// # Errors
    /// Returns a [`DecodeError`] if the bytes are not a valid encoding.
    fn deserialize(&self, bytes: &[u8]) -> Result<Node, DecodeError>;
}
