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

//! Defines how material libraries referenced by a mesh document are located.

use kiln_core::bake::AssetReference;
use std::path::Path;

/// Locates the bytes of a material library referenced from a mesh document.
pub trait MaterialLibraryResolver: Send + Sync {
    /// Resolves `library`, as written in the document, for the document at `source`.
    fn resolve(&self, source: &AssetReference, library: &Path) -> Result<Vec<u8>, String>;
}

/// Resolves libraries on the local filesystem, relative to the source document.
///
/// Remote sources have no sibling files and never resolve.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystemMaterialResolver;

impl MaterialLibraryResolver for FileSystemMaterialResolver {
    fn resolve(&self, source: &AssetReference, library: &Path) -> Result<Vec<u8>, String> {
        let directory = source
            .local_directory()
            .ok_or_else(|| format!("{source} is remote, material library '{}' skipped", library.display()))?;
        let path = directory.join(library);
        std::fs::read(&path)
            .map_err(|e| format!("Failed to read material library '{}': {}", path.display(), e))
    }
}
