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

//! The structured geometry document produced by ingestion.
//!
//! The document is consumed read-only by the scene graph builder. It is a plain
//! data description: meshes with their parts, and a material table keyed by name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name given to the material used when a source provides none.
pub const DEFAULT_MATERIAL_NAME: &str = "default";

/// A fully ingested mesh description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryDocument {
    /// Meshes in document order.
    pub meshes: Vec<Mesh>,
    /// Materials keyed by name. Ordered so iteration is deterministic.
    pub materials: BTreeMap<String, Material>,
}

impl GeometryDocument {
    /// Looks up a material by name.
    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    /// If the document holds exactly one material, returns its name and value.
    ///
    /// This is the "no material specified" case: every part is then baked against
    /// that single material whatever name the part carries.
    pub fn sole_material(&self) -> Option<(&str, &Material)> {
        if self.materials.len() == 1 {
            self.materials
                .iter()
                .next()
                .map(|(name, material)| (name.as_str(), material))
        } else {
            None
        }
    }
}

/// One mesh: shared vertex streams and a list of parts indexing into them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    /// Mesh name as found in the source.
    pub name: String,
    /// Vertex positions
    pub positions: Vec<[f32; 3]>,
    /// Vertex normals, empty if the source has none
    pub normals: Vec<[f32; 3]>,
    /// Vertex texture coordinates, empty if the source has none
    pub tex_coords: Vec<[f32; 2]>,
    /// Parts in document order.
    pub parts: Vec<MeshPart>,
}

impl Mesh {
    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Total number of triangles across all parts.
    pub fn triangle_count(&self) -> usize {
        self.parts.iter().map(|p| p.indices.len() / 3).sum()
    }
}

/// A run of triangles drawn with a single material.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshPart {
    /// Name of the material in [`GeometryDocument::materials`].
    pub material: String,
    /// Triangle list indices into the owning mesh's vertex streams.
    pub indices: Vec<u32>,
}

/// Surface description of a material.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Diffuse color (linear RGB).
    pub diffuse_color: [f32; 3],
    /// Specular color (linear RGB).
    pub specular_color: [f32; 3],
    /// Specular exponent.
    pub shininess: f32,
    /// 1.0 is fully opaque.
    pub opacity: f32,
    /// Albedo (diffuse) texture file name, relative to the source.
    pub albedo_texture: Option<String>,
    /// Specular texture file name, relative to the source.
    pub specular_texture: Option<String>,
}

impl Material {
    /// The albedo texture, if set and non-empty.
    pub fn albedo_texture(&self) -> Option<&str> {
        non_empty(&self.albedo_texture)
    }

    /// The specular texture, if set and non-empty.
    pub fn specular_texture(&self) -> Option<&str> {
        non_empty(&self.specular_texture)
    }

    /// Whether any texture slot is set.
    pub fn has_texture(&self) -> bool {
        self.albedo_texture().is_some() || self.specular_texture().is_some()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl Default for Material {
    /// White diffuse, black specular, no shininess, fully opaque, untextured.
    fn default() -> Self {
        Self {
            diffuse_color: [1.0, 1.0, 1.0],
            specular_color: [0.0, 0.0, 0.0],
            shininess: 0.0,
            opacity: 1.0,
            albedo_texture: None,
            specular_texture: None,
        }
    }
}
