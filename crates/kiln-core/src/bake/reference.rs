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

//! Input references: where the mesh description to bake comes from.

use std::fmt;
use std::path::{Path, PathBuf};

/// The location of a mesh description document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetReference {
    /// A file on the local filesystem.
    Local(PathBuf),
    /// An `http` or `https` URL.
    Remote(String),
}

impl AssetReference {
    /// Classifies a raw input string.
    ///
    /// `http://` and `https://` URLs are remote. `file://` URLs and everything
    /// else are treated as local paths.
    pub fn parse(input: &str) -> Self {
        let lower = input.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            AssetReference::Remote(input.to_string())
        } else if lower.starts_with("file://") {
            AssetReference::Local(PathBuf::from(&input["file://".len()..]))
        } else {
            AssetReference::Local(PathBuf::from(input))
        }
    }

    /// Whether the reference points to the local filesystem.
    pub fn is_local(&self) -> bool {
        matches!(self, AssetReference::Local(_))
    }

    /// The last path segment, without query or fragment.
    pub fn file_name(&self) -> Option<String> {
        match self {
            AssetReference::Local(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            AssetReference::Remote(url) => {
                let without_suffix = url.split(['?', '#']).next().unwrap_or(url);
                let after_scheme = without_suffix
                    .split_once("://")
                    .map_or(without_suffix, |(_, rest)| rest);
                // The first segment is the host, never a file name.
                let (_, path) = after_scheme.split_once('/')?;
                path.rsplit('/')
                    .next()
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
            }
        }
    }

    /// The file name up to its last `.`, or the whole name if it has none.
    pub fn base_name(&self) -> Option<String> {
        let file_name = self.file_name()?;
        match file_name.rfind('.') {
            Some(0) | None => Some(file_name),
            Some(dot) => Some(file_name[..dot].to_string()),
        }
    }

    /// The extension after the last `.`, if any.
    pub fn extension(&self) -> Option<String> {
        let file_name = self.file_name()?;
        match file_name.rfind('.') {
            Some(0) | None => None,
            Some(dot) => Some(file_name[dot + 1..].to_string()),
        }
    }

    /// For local references, the directory containing the file.
    pub fn local_directory(&self) -> Option<&Path> {
        match self {
            AssetReference::Local(path) => path.parent(),
            AssetReference::Remote(_) => None,
        }
    }
}

impl fmt::Display for AssetReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetReference::Local(path) => write!(f, "{}", path.display()),
            AssetReference::Remote(url) => f.write_str(url),
        }
    }
}

impl From<&str> for AssetReference {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_urls_and_paths() {
        assert!(!AssetReference::parse("https://cdn.example.com/m/chair.obj").is_local());
        assert!(!AssetReference::parse("HTTP://example.com/a.obj").is_local());
        assert_eq!(
            AssetReference::parse("file:///data/chair.obj"),
            AssetReference::Local(PathBuf::from("/data/chair.obj"))
        );
        assert!(AssetReference::parse("models/chair.obj").is_local());
    }

    #[test]
    fn names_of_remote_references_ignore_query() {
        let r = AssetReference::parse("https://example.com/models/chair.v2.obj?token=abc#x");
        assert_eq!(r.file_name().as_deref(), Some("chair.v2.obj"));
        assert_eq!(r.base_name().as_deref(), Some("chair.v2"));
        assert_eq!(r.extension().as_deref(), Some("obj"));

        assert_eq!(AssetReference::parse("https://example.com/").file_name(), None);
        assert_eq!(AssetReference::parse("https://example.com").file_name(), None);
    }

    #[test]
    fn local_names() {
        let r = AssetReference::parse("/data/models/crate.obj");
        assert_eq!(r.base_name().as_deref(), Some("crate"));
        assert_eq!(r.local_directory(), Some(Path::new("/data/models")));

        let r = AssetReference::parse("/data/Makefile");
        assert_eq!(r.base_name().as_deref(), Some("Makefile"));
        assert_eq!(r.extension(), None);
    }
}
