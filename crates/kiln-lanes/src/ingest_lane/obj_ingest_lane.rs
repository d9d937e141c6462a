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

//! Defines a lane for ingesting Wavefront OBJ documents.

use super::{FileSystemMaterialResolver, MaterialLibraryResolver};
use ahash::AHashMap;
use kiln_core::bake::{AssetReference, BakeError, GeometryIngestor, IngestOptions};
use kiln_core::geometry::{GeometryDocument, Material, Mesh, MeshPart, DEFAULT_MATERIAL_NAME};
use std::collections::BTreeMap;
use std::io::Cursor;

/// Lane for ingesting OBJ documents through `tobj`.
pub struct ObjIngestLane {
    resolver: Box<dyn MaterialLibraryResolver>,
}

impl Default for ObjIngestLane {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjIngestLane {
    /// Creates a lane that reads material libraries from the local filesystem.
    pub fn new() -> Self {
        Self::with_resolver(FileSystemMaterialResolver)
    }

    /// Creates a lane with a custom material library resolver.
    pub fn with_resolver(resolver: impl MaterialLibraryResolver + 'static) -> Self {
        Self {
            resolver: Box::new(resolver),
        }
    }
}

impl GeometryIngestor for ObjIngestLane {
    fn parse(
        &self,
        bytes: &[u8],
        options: &IngestOptions,
        combine_parts: bool,
        source: &AssetReference,
    ) -> Result<GeometryDocument, BakeError> {
        let reference = source.to_string();
        let obj_text = std::str::from_utf8(bytes)
            .map_err(|e| BakeError::parse_failed(&reference, format!("not valid UTF-8: {e}")))?;

        let (models, materials) = tobj::load_obj_buf(
            &mut Cursor::new(obj_text),
            &tobj::LoadOptions {
                triangulate: options.triangulate,
                single_index: true,
                ..Default::default()
            },
            |library| {
                if !combine_parts {
                    return Ok((Vec::new(), AHashMap::new()));
                }
                match self.resolver.resolve(source, library) {
                    Ok(mtl) => tobj::load_mtl_buf(&mut Cursor::new(mtl)),
                    Err(reason) => {
                        log::warn!("{reason}; falling back to the default material");
                        Ok((Vec::new(), AHashMap::new()))
                    }
                }
            },
        )
        .map_err(|e| BakeError::parse_failed(&reference, e))?;

        // tobj reports an empty, unnamed model for documents without faces.
        let models: Vec<tobj::Model> = models
            .into_iter()
            .filter(|model| {
                let has_faces = !model.mesh.positions.is_empty() && !model.mesh.indices.is_empty();
                if !has_faces {
                    log::debug!("Skipping object '{}' of {reference}: no faces", model.name);
                }
                has_faces
            })
            .collect();
        if models.is_empty() {
            return Err(BakeError::parse_failed(&reference, "no faces found"));
        }

        let tobj_materials = materials.unwrap_or_else(|e| {
            log::warn!("Ignoring materials of {reference}: {e}");
            Vec::new()
        });

        let mut document = GeometryDocument {
            meshes: Vec::new(),
            materials: convert_materials(&tobj_materials),
        };

        let material_names: Vec<String> = models
            .iter()
            .map(|model| {
                model
                    .mesh
                    .material_id
                    .and_then(|id| tobj_materials.get(id))
                    .map(|m| m.name.clone())
                    .unwrap_or_else(|| DEFAULT_MATERIAL_NAME.to_string())
            })
            .collect();
        if material_names.iter().any(|n| n == DEFAULT_MATERIAL_NAME) {
            document
                .materials
                .entry(DEFAULT_MATERIAL_NAME.to_string())
                .or_default();
        }

        if combine_parts {
            let name = source.base_name().unwrap_or_else(|| models[0].name.clone());
            document
                .meshes
                .push(combine(name, &models, &material_names));
        } else {
            for (model, material) in models.iter().zip(&material_names) {
                document
                    .meshes
                    .push(combine(model.name.clone(), std::slice::from_ref(model), std::slice::from_ref(material)));
            }
        }

        log::debug!(
            "Ingested {}: {} object(s), {} mesh(es), {} material(s)",
            reference,
            models.len(),
            document.meshes.len(),
            document.materials.len()
        );
        Ok(document)
    }
}

fn convert_materials(materials: &[tobj::Material]) -> BTreeMap<String, Material> {
    let fallback = Material::default();
    materials
        .iter()
        .map(|m| {
            let material = Material {
                diffuse_color: m.diffuse.unwrap_or(fallback.diffuse_color),
                specular_color: m.specular.unwrap_or(fallback.specular_color),
                shininess: m.shininess.unwrap_or(fallback.shininess),
                opacity: m.dissolve.unwrap_or(fallback.opacity),
                albedo_texture: m.diffuse_texture.clone(),
                specular_texture: m.specular_texture.clone(),
            };
            (m.name.clone(), material)
        })
        .collect()
}

/// Merges `models` into one mesh with one part per model, rebasing indices.
///
/// Streams missing from some models but present in others are zero-filled so
/// every stream stays aligned with the positions.
fn combine(name: String, models: &[tobj::Model], material_names: &[String]) -> Mesh {
    let with_normals = models.iter().any(|m| !m.mesh.normals.is_empty());
    let with_tex_coords = models.iter().any(|m| !m.mesh.texcoords.is_empty());

    let mut mesh = Mesh {
        name,
        ..Default::default()
    };

    for (model, material) in models.iter().zip(material_names) {
        let source = &model.mesh;
        let base = mesh.positions.len() as u32;
        let vertex_count = source.positions.len() / 3;

        mesh.positions
            .extend(source.positions.chunks_exact(3).map(|v| [v[0], v[1], v[2]]));

        if with_normals {
            if source.normals.len() / 3 == vertex_count {
                mesh.normals
                    .extend(source.normals.chunks_exact(3).map(|n| [n[0], n[1], n[2]]));
            } else {
                mesh.normals.extend(std::iter::repeat([0.0; 3]).take(vertex_count));
            }
        }

        if with_tex_coords {
            if source.texcoords.len() / 2 == vertex_count {
                mesh.tex_coords
                    .extend(source.texcoords.chunks_exact(2).map(|t| [t[0], t[1]]));
            } else {
                mesh.tex_coords
                    .extend(std::iter::repeat([0.0; 2]).take(vertex_count));
            }
        }

        mesh.parts.push(MeshPart {
            material: material.clone(),
            indices: source.indices.iter().map(|i| i + base).collect(),
        });
    }

    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const TWO_OBJECTS: &str = "\
mtllib scene.mtl
o first
v 0 0 0
v 1 0 0
v 0 1 0
vn 0 0 1
usemtl red
f 1//1 2//1 3//1
o second
v 0 0 1
v 1 0 1
v 1 1 1
v 0 1 1
usemtl blue
f 4 5 6 7
";

    const SCENE_MTL: &str = "\
newmtl red
Kd 1 0 0
Ks 0.5 0.5 0.5
Ns 10
d 0.5
map_Kd red.png
newmtl blue
Kd 0 0 1
map_Ks blue_spec.png
";

    struct InMemoryResolver(&'static str);

    impl MaterialLibraryResolver for InMemoryResolver {
        fn resolve(&self, _: &AssetReference, library: &Path) -> Result<Vec<u8>, String> {
            assert_eq!(library, Path::new("scene.mtl"));
            Ok(self.0.as_bytes().to_vec())
        }
    }

    struct MissingResolver;

    impl MaterialLibraryResolver for MissingResolver {
        fn resolve(&self, _: &AssetReference, library: &Path) -> Result<Vec<u8>, String> {
            Err(format!("{} not found", library.display()))
        }
    }

    fn source() -> AssetReference {
        AssetReference::parse("assets/scene.obj")
    }

    #[test]
    fn single_triangle_uses_default_material() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let doc = ObjIngestLane::with_resolver(MissingResolver)
            .parse(obj.as_bytes(), &IngestOptions::default(), true, &source())
            .unwrap();

        assert_eq!(doc.meshes.len(), 1);
        assert_eq!(doc.meshes[0].name, "scene");
        assert_eq!(doc.meshes[0].parts.len(), 1);
        assert_eq!(doc.meshes[0].parts[0].material, DEFAULT_MATERIAL_NAME);
        assert_eq!(doc.meshes[0].parts[0].indices, vec![0, 1, 2]);
        assert_eq!(doc.sole_material().unwrap().1, &Material::default());
    }

    #[test]
    fn combined_parts_rebase_indices_and_read_materials() {
        let doc = ObjIngestLane::with_resolver(InMemoryResolver(SCENE_MTL))
            .parse(TWO_OBJECTS.as_bytes(), &IngestOptions::default(), true, &source())
            .unwrap();

        assert_eq!(doc.meshes.len(), 1);
        let mesh = &doc.meshes[0];
        assert_eq!(mesh.vertex_count(), 7);
        assert_eq!(mesh.normals.len(), 7);
        assert_eq!(mesh.parts.len(), 2);
        assert_eq!(mesh.parts[0].material, "red");
        assert_eq!(mesh.parts[1].material, "blue");
        // The quad is triangulated and its indices start after the first object.
        assert_eq!(mesh.parts[1].indices.len(), 6);
        assert!(mesh.parts[1].indices.iter().all(|i| *i >= 3));

        let red = doc.material("red").unwrap();
        assert_eq!(red.diffuse_color, [1.0, 0.0, 0.0]);
        assert_eq!(red.shininess, 10.0);
        assert_eq!(red.opacity, 0.5);
        assert_eq!(red.albedo_texture(), Some("red.png"));
        assert_eq!(doc.material("blue").unwrap().specular_texture(), Some("blue_spec.png"));
        assert!(doc.material(DEFAULT_MATERIAL_NAME).is_none());
    }

    #[test]
    fn unresolved_library_falls_back_to_default() {
        let doc = ObjIngestLane::with_resolver(MissingResolver)
            .parse(TWO_OBJECTS.as_bytes(), &IngestOptions::default(), true, &source())
            .unwrap();
        assert!(doc.meshes[0]
            .parts
            .iter()
            .all(|p| p.material == DEFAULT_MATERIAL_NAME));
        assert_eq!(doc.materials.len(), 1);
    }

    #[test]
    fn separate_parts_keep_one_mesh_per_object() {
        let doc = ObjIngestLane::with_resolver(MissingResolver)
            .parse(TWO_OBJECTS.as_bytes(), &IngestOptions::default(), false, &source())
            .unwrap();
        assert_eq!(doc.meshes.len(), 2);
        assert_eq!(doc.meshes[0].name, "first");
        assert_eq!(doc.meshes[1].parts[0].indices[0], 0);
    }

    #[test]
    fn rejects_non_utf8_and_empty_documents() {
        let lane = ObjIngestLane::new();
        let err = lane
            .parse(&[0xff, 0xfe, 0x00], &IngestOptions::default(), true, &source())
            .unwrap_err();
        assert!(matches!(err, BakeError::ParseFailed { .. }));

        let documents: [&[u8]; 3] = [b"", b"# only a comment\n", b"v 0 0 0\nv 1 0 0\n"];
        for document in documents {
            let err = lane
                .parse(document, &IngestOptions::default(), true, &source())
                .unwrap_err();
            assert!(
                matches!(err, BakeError::ParseFailed { ref reason, .. } if reason == "no faces found"),
                "{err:?}"
            );
        }
    }

    #[test]
    fn objects_without_faces_are_dropped() {
        let obj = "o empty\nv 9 9 9\no tri\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 2 3 4\n";
        let doc = ObjIngestLane::with_resolver(MissingResolver)
            .parse(obj.as_bytes(), &IngestOptions::default(), false, &source())
            .unwrap();
        assert_eq!(doc.meshes.len(), 1);
        assert_eq!(doc.meshes[0].name, "tri");
    }
}
