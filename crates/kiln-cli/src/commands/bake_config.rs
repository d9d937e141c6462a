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

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::helpers::print_info;

/// Default name of the manifest looked up in the current directory.
pub const MANIFEST_FILE: &str = "Bake.toml";

/// Represents the structure of the `Bake.toml` manifest file.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct BakeManifest {
    /// Inputs baked when none are given on the command line.
    pub inputs: Vec<String>,
    /// Where working copies are placed.
    pub working_directory: PathBuf,
    /// Where artifacts and re-encoded textures are written.
    pub output_directory: PathBuf,
    /// If set, unmodified inputs are mirrored here.
    pub original_directory: Option<PathBuf>,
    /// Split polygons into triangles while ingesting.
    pub triangulate: bool,
}

impl Default for BakeManifest {
    /// Provides a default configuration if `Bake.toml` is not found.
    ///
    /// Working copies go to `.bake/work` and artifacts to `.bake/out`.
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            working_directory: PathBuf::from(".bake/work"),
            output_directory: PathBuf::from(".bake/out"),
            original_directory: None,
            triangulate: true,
        }
    }
}

/// Loads the manifest at `path`.
/// If the file does not exist, it returns the default configuration.
pub fn load_manifest(path: &Path) -> Result<BakeManifest> {
    if !path.exists() {
        print_info(&format!(
            "No '{}' found. Using default configuration.",
            path.display()
        ));
        return Ok(BakeManifest::default());
    }

    print_info(&format!("Found '{}'. Loading configuration.", path.display()));
    let manifest_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest file at '{}'", path.display()))?;
    toml::from_str(&manifest_str)
        .with_context(|| format!("Failed to parse TOML from '{}'", path.display()))
}
