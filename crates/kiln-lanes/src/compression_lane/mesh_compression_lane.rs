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

//! Packs a mesh into a compact binary layout and compresses it with LZ4.

use kiln_core::bake::{BakeError, MeshCompressor};
use kiln_core::geometry::Mesh;
use serde::{Deserialize, Serialize};

/// Leading bytes of every compressed mesh payload.
pub const MESH_PAYLOAD_MAGIC: [u8; 4] = *b"KMSH";

#[derive(Serialize)]
struct MeshPayloadRef<'a> {
    has_deformers: bool,
    mesh: &'a Mesh,
}

/// A mesh recovered from a payload produced by [`Lz4MeshCompressionLane`].
#[derive(Debug, Deserialize)]
pub struct DecodedMesh {
    /// Whether the payload was produced with skinning data.
    pub has_deformers: bool,
    /// The mesh itself.
    pub mesh: Mesh,
}

/// Mesh compressor producing `KMSH` + size-prefixed LZ4 of the bincode layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4MeshCompressionLane;

impl Lz4MeshCompressionLane {
    /// Creates a new `Lz4MeshCompressionLane`.
    pub fn new() -> Self {
        Self
    }

    /// Reverses [`MeshCompressor::compress`].
    pub fn decompress(&self, payload: &[u8]) -> Result<DecodedMesh, BakeError> {
        let body = payload
            .strip_prefix(&MESH_PAYLOAD_MAGIC)
            .ok_or_else(|| BakeError::compression_failed("mesh payload", "missing KMSH header"))?;
        let raw = lz4_flex::decompress_size_prepended(body)
            .map_err(|e| BakeError::compression_failed("mesh payload", e))?;
        let (decoded, _) = bincode::serde::decode_from_slice(&raw, bincode::config::standard())
            .map_err(|e| BakeError::compression_failed("mesh payload", e))?;
        Ok(decoded)
    }
}

impl MeshCompressor for Lz4MeshCompressionLane {
    fn compress(&self, mesh: &Mesh, has_deformers: bool) -> Result<Vec<u8>, BakeError> {
        validate(mesh)?;

        let payload = MeshPayloadRef {
            has_deformers,
            mesh,
        };
        let raw = bincode::serde::encode_to_vec(&payload, bincode::config::standard())
            .map_err(|e| BakeError::compression_failed(&mesh.name, e))?;
        let compressed = lz4_flex::compress_prepend_size(&raw);

        log::debug!(
            "Compressed mesh '{}': {} vertices, {} triangles, {} -> {} bytes",
            mesh.name,
            mesh.vertex_count(),
            mesh.triangle_count(),
            raw.len(),
            compressed.len()
        );

        let mut out = Vec::with_capacity(MESH_PAYLOAD_MAGIC.len() + compressed.len());
        out.extend_from_slice(&MESH_PAYLOAD_MAGIC);
        out.extend_from_slice(&compressed);
        Ok(out)
    }
}

fn validate(mesh: &Mesh) -> Result<(), BakeError> {
    if mesh.positions.is_empty() {
        return Err(BakeError::compression_failed(&mesh.name, "mesh has no vertices"));
    }
    let vertex_count = mesh.positions.len();
    if !mesh.normals.is_empty() && mesh.normals.len() != vertex_count {
        return Err(BakeError::compression_failed(
            &mesh.name,
            "normal count does not match vertex count",
        ));
    }
    if !mesh.tex_coords.is_empty() && mesh.tex_coords.len() != vertex_count {
        return Err(BakeError::compression_failed(
            &mesh.name,
            "texture coordinate count does not match vertex count",
        ));
    }
    for part in &mesh.parts {
        if part.indices.len() % 3 != 0 {
            return Err(BakeError::compression_failed(
                &mesh.name,
                format!("part '{}' is not a triangle list", part.material),
            ));
        }
        if let Some(bad) = part.indices.iter().find(|i| **i as usize >= vertex_count) {
            return Err(BakeError::compression_failed(
                &mesh.name,
                format!("index {bad} out of range ({vertex_count} vertices)"),
            ));
        }
    }
    Ok(())
}
