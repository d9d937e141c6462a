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

//! Builds the node tree and connection graph of a baked scene.
//!
//! Identities are allocated in a fixed order: geometry, model, each material in
//! the order mesh parts first reference it, then one texture per textured part
//! in part order. Consumers of the baked format depend on this numbering.

use kiln_core::bake::{
    BakeError, MeshCompressor, TextureCompressor, TextureRequest, TextureUsage,
};
use kiln_core::geometry::{GeometryDocument, Material};
use kiln_core::tree::{Connection, ConnectionGraph, IdentityAllocator, Node, NodeId};
use std::collections::HashSet;
use std::path::Path;

/// Scale of one unit in the baked scene, in centimeters.
pub const UNIT_SCALE_FACTOR: f64 = 100.0;

/// Texture slot name written for albedo maps.
pub const ALBEDO_SLOT: &str = "Kd";
/// Texture slot name written for specular maps.
pub const SPECULAR_SLOT: &str = "Ka";

/// The collaborators and locations a build works with.
#[derive(Clone, Copy)]
pub struct SceneBuildContext<'a> {
    /// Human-readable name of the source, used in error messages.
    pub reference: &'a str,
    /// Compresses the geometry payload.
    pub mesh_compressor: &'a dyn MeshCompressor,
    /// Re-encodes material textures.
    pub texture_compressor: &'a dyn TextureCompressor,
    /// Directory texture file names are relative to.
    pub texture_source_dir: &'a Path,
    /// Directory re-encoded textures are written to.
    pub output_dir: &'a Path,
}

/// A built scene: the document root and the edges it embeds.
#[derive(Debug, Clone, PartialEq)]
pub struct BakedScene {
    /// Root whose children are `GlobalSettings`, `Objects` and `Connections`.
    pub root: Node,
    /// The edges also encoded under the root's `Connections` node.
    pub connections: ConnectionGraph,
}

impl BakedScene {
    /// Every identity carried by a node under `Objects`.
    pub fn object_ids(&self) -> HashSet<NodeId> {
        self.root
            .child("Objects")
            .map(|objects| objects.children.iter().filter_map(Node::id).collect())
            .unwrap_or_default()
    }
}

/// Lane converting one [`GeometryDocument`] into a [`BakedScene`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneGraphBuilderLane;

impl SceneGraphBuilderLane {
    /// Creates a new `SceneGraphBuilderLane`.
    pub fn new() -> Self {
        Self
    }

    /// Builds the scene for `document`, drawing identities from `ids`.
    ///
    /// The first collaborator error aborts the build; nothing partial is
    /// returned.
    ///
    /// # Errors
    /// [`BakeError::ParseFailed`] when the document has no mesh or a part names
    /// an unknown material, [`BakeError::CompressionFailed`] when a compressor
    /// fails.
    pub fn build(
        &self,
        document: &GeometryDocument,
        ids: &mut IdentityAllocator,
        context: &SceneBuildContext<'_>,
    ) -> Result<BakedScene, BakeError> {
        let mesh = document
            .meshes
            .first()
            .ok_or_else(|| BakeError::parse_failed(context.reference, "document has no mesh"))?;
        if document.meshes.len() > 1 {
            log::warn!(
                "{}: only the first of {} meshes is baked",
                context.reference,
                document.meshes.len()
            );
        }

        let mut objects = Node::new("Objects");
        let mut connections = ConnectionGraph::new();

        // Geometry
        let geometry_id = ids.allocate();
        let payload = context.mesh_compressor.compress(mesh, false)?;
        objects.push_child(
            Node::new("Geometry")
                .with_property(geometry_id)
                .with_property("Geometry")
                .with_property("Mesh")
                .with_child(Node::new("CompressedMesh").with_property(payload)),
        );

        // Model
        let model_id = ids.allocate();
        objects.push_child(
            Node::new("Model")
                .with_property(model_id)
                .with_property("Model")
                .with_property("Mesh"),
        );
        connections.push(Connection::object_to_object(geometry_id, model_id));

        // Materials, first-seen order
        let part_materials = resolve_part_materials(document, mesh, context.reference)?;
        let mut material_ids: Vec<(&str, NodeId)> = Vec::new();
        let mut parts: Vec<(&Material, NodeId)> = Vec::with_capacity(part_materials.len());
        for &(name, material) in &part_materials {
            let material_id = match material_ids.iter().find(|(known, _)| *known == name) {
                Some(&(_, id)) => id,
                None => {
                    let id = ids.allocate();
                    objects.push_child(material_node(id, name, material));
                    connections.push(Connection::object_to_object(id, model_id));
                    material_ids.push((name, id));
                    id
                }
            };
            parts.push((material, material_id));
        }

        // Textures, one per textured part
        let mut texture_edges: Vec<(NodeId, NodeId)> = Vec::new();
        for (material, material_id) in parts {
            if !material.has_texture() {
                continue;
            }
            let texture_id = ids.allocate();
            let (filename, slot) = match material.albedo_texture() {
                Some(albedo) => (albedo, ALBEDO_SLOT),
                None => (material.specular_texture().unwrap_or_default(), SPECULAR_SLOT),
            };
            let request = TextureRequest {
                filename,
                source_dir: context.texture_source_dir,
                output_dir: context.output_dir,
            };
            let usage = || {
                if material.albedo_texture().is_some() {
                    TextureUsage::Albedo
                } else {
                    TextureUsage::Specular
                }
            };
            let baked_name = context.texture_compressor.compress(&request, &usage)?;

            objects.push_child(
                Node::new("Texture")
                    .with_property(texture_id)
                    .with_child(Node::new("TextureName").with_property(slot))
                    .with_child(Node::new("RelativeFilename").with_property(baked_name)),
            );
            texture_edges.push((texture_id, material_id));
        }
        for (texture_id, material_id) in texture_edges {
            connections.push(Connection::object_to_property(
                texture_id,
                material_id,
                "AmbientFactor",
            ));
            connections.push(Connection::object_to_property(
                texture_id,
                material_id,
                "DiffuseColor",
            ));
        }

        let root = Node::root()
            .with_child(global_settings())
            .with_child(objects)
            .with_child(connections.to_node());

        log::debug!(
            "Built scene for {}: {} identities, {} connections",
            context.reference,
            ids.allocated(),
            connections.len()
        );
        Ok(BakedScene { root, connections })
    }
}

/// Pairs each part of `mesh` with its material.
///
/// A document holding exactly one material bakes every part against it.
fn resolve_part_materials<'d>(
    document: &'d GeometryDocument,
    mesh: &'d kiln_core::geometry::Mesh,
    reference: &str,
) -> Result<Vec<(&'d str, &'d Material)>, BakeError> {
    if let Some(sole) = document.sole_material() {
        return Ok(vec![sole; mesh.parts.len()]);
    }
    mesh.parts
        .iter()
        .map(|part| {
            document
                .materials
                .get_key_value(&part.material)
                .map(|(name, material)| (name.as_str(), material))
                .ok_or_else(|| {
                    BakeError::parse_failed(
                        reference,
                        format!("part references unknown material '{}'", part.material),
                    )
                })
        })
        .collect()
}

fn material_node(id: NodeId, name: &str, material: &Material) -> Node {
    let [dr, dg, db] = material.diffuse_color;
    let [sr, sg, sb] = material.specular_color;
    let properties = Node::new("Properties70")
        .with_child(color_property("DiffuseColor", dr, dg, db))
        .with_child(color_property("SpecularColor", sr, sg, sb))
        .with_child(number_property("Shininess", material.shininess))
        .with_child(number_property("Opacity", material.opacity));

    Node::new("Material")
        .with_property(id)
        .with_property(name)
        .with_property("Mesh")
        .with_child(properties)
}

fn color_property(name: &str, r: f32, g: f32, b: f32) -> Node {
    Node::new("P")
        .with_properties([name, "Color", "", "A"])
        .with_properties([r, g, b])
}

fn number_property(name: &str, value: f32) -> Node {
    Node::new("P")
        .with_properties([name, "Number", "", "A"])
        .with_property(value)
}

fn global_settings() -> Node {
    Node::new("GlobalSettings").with_child(
        Node::new("Properties70").with_child(
            Node::new("P")
                .with_properties(["UnitScaleFactor", "double", "Number", ""])
                .with_property(UNIT_SCALE_FACTOR),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization_lane::FbxBinaryLane;
    use kiln_core::bake::TreeSerializer;
    use kiln_core::geometry::{Mesh, MeshPart, DEFAULT_MATERIAL_NAME};
    use kiln_core::tree::{ConnectionKind, PropertyValue};
    use std::sync::Mutex;

    struct StubMesh;

    impl MeshCompressor for StubMesh {
        fn compress(&self, mesh: &Mesh, _: bool) -> Result<Vec<u8>, BakeError> {
            Ok(mesh.name.as_bytes().to_vec())
        }
    }

    /// Records the deformer flag of every call.
    #[derive(Default)]
    struct RecordingMesh {
        deformer_flags: Mutex<Vec<bool>>,
    }

    impl MeshCompressor for RecordingMesh {
        fn compress(&self, mesh: &Mesh, has_deformers: bool) -> Result<Vec<u8>, BakeError> {
            self.deformer_flags.lock().unwrap().push(has_deformers);
            Ok(mesh.name.as_bytes().to_vec())
        }
    }

    struct FailingMesh;

    impl MeshCompressor for FailingMesh {
        fn compress(&self, mesh: &Mesh, _: bool) -> Result<Vec<u8>, BakeError> {
            Err(BakeError::compression_failed(&mesh.name, "always fails"))
        }
    }

    /// Records each filename and the usage hint it was given.
    #[derive(Default)]
    struct RecordingTextures {
        calls: Mutex<Vec<(String, TextureUsage)>>,
    }

    impl TextureCompressor for RecordingTextures {
        fn compress(
            &self,
            request: &TextureRequest<'_>,
            usage: &dyn Fn() -> TextureUsage,
        ) -> Result<String, BakeError> {
            self.calls
                .lock()
                .unwrap()
                .push((request.filename.to_string(), usage()));
            Ok(format!("baked_{}", request.filename))
        }
    }

    fn context<'a>(
        meshes: &'a dyn MeshCompressor,
        textures: &'a dyn TextureCompressor,
    ) -> SceneBuildContext<'a> {
        SceneBuildContext {
            reference: "test.obj",
            mesh_compressor: meshes,
            texture_compressor: textures,
            texture_source_dir: Path::new("src"),
            output_dir: Path::new("out"),
        }
    }

    fn document(parts: &[&str], materials: &[(&str, Material)]) -> GeometryDocument {
        GeometryDocument {
            meshes: vec![Mesh {
                name: "mesh".into(),
                positions: vec![[0.0; 3]; 3],
                parts: parts
                    .iter()
                    .map(|m| MeshPart {
                        material: m.to_string(),
                        indices: vec![0, 1, 2],
                    })
                    .collect(),
                ..Default::default()
            }],
            materials: materials
                .iter()
                .map(|(n, m)| (n.to_string(), m.clone()))
                .collect(),
        }
    }

    fn textured(albedo: Option<&str>, specular: Option<&str>) -> Material {
        Material {
            albedo_texture: albedo.map(str::to_string),
            specular_texture: specular.map(str::to_string),
            ..Default::default()
        }
    }

    fn build(doc: &GeometryDocument) -> (BakedScene, IdentityAllocator) {
        let textures = RecordingTextures::default();
        let mut ids = IdentityAllocator::new();
        let scene = SceneGraphBuilderLane
            .build(doc, &mut ids, &context(&StubMesh, &textures))
            .unwrap();
        (scene, ids)
    }

    fn text(values: &[&str]) -> Vec<PropertyValue> {
        values.iter().map(|v| PropertyValue::from(*v)).collect()
    }

    /// The `P` entries of a node's `Properties70` child.
    fn p_entries(node: &Node) -> Vec<&[PropertyValue]> {
        node.child("Properties70")
            .unwrap()
            .children_named("P")
            .map(|p| p.properties.as_slice())
            .collect()
    }

    fn texture_slot(texture: &Node) -> &str {
        texture.child("TextureName").unwrap().properties[0]
            .as_text()
            .unwrap()
    }

    #[test]
    fn single_untextured_material_uses_three_identities() {
        let doc = document(&[DEFAULT_MATERIAL_NAME], &[(DEFAULT_MATERIAL_NAME, Material::default())]);
        let (scene, ids) = build(&doc);

        assert_eq!(ids.allocated(), 3);
        assert_eq!(scene.connections.count(ConnectionKind::ObjectToObject), 2);
        assert_eq!(scene.connections.count(ConnectionKind::ObjectToProperty), 0);

        let names: Vec<_> = scene.root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["GlobalSettings", "Objects", "Connections"]);
        let objects = scene.root.child("Objects").unwrap();
        assert_eq!(objects.children.len(), 3);

        let edges = scene.connections.edges();
        assert_eq!(edges[0], Connection::object_to_object(NodeId::new(1), NodeId::new(2)));
        assert_eq!(edges[1], Connection::object_to_object(NodeId::new(3), NodeId::new(2)));
    }

    #[test]
    fn object_headers_and_global_settings() {
        let doc = document(&["a"], &[("a", Material::default())]);
        let (scene, _) = build(&doc);

        let settings = scene.root.child("GlobalSettings").unwrap();
        let mut unit_scale = text(&["UnitScaleFactor", "double", "Number", ""]);
        unit_scale.push(PropertyValue::Float(100.0));
        assert_eq!(p_entries(settings), vec![unit_scale.as_slice()]);

        let objects = scene.root.child("Objects").unwrap();
        let geometry = objects.child("Geometry").unwrap();
        assert_eq!(
            geometry.properties,
            vec![
                PropertyValue::from(NodeId::new(1)),
                PropertyValue::from("Geometry"),
                PropertyValue::from("Mesh"),
            ]
        );
        assert_eq!(
            geometry.child("CompressedMesh").unwrap().properties[0].as_blob(),
            Some(&b"mesh"[..])
        );
        assert_eq!(
            objects.child("Model").unwrap().properties,
            vec![
                PropertyValue::from(NodeId::new(2)),
                PropertyValue::from("Model"),
                PropertyValue::from("Mesh"),
            ]
        );
    }

    #[test]
    fn material_properties_use_properties70_layout() {
        let custom = Material {
            diffuse_color: [0.5, 0.25, 0.0],
            specular_color: [1.0, 0.5, 0.25],
            shininess: 8.0,
            opacity: 0.5,
            ..Default::default()
        };
        let doc = document(&["plain", "custom"], &[("plain", Material::default()), ("custom", custom)]);
        let (scene, _) = build(&doc);
        let materials: Vec<_> = scene
            .root
            .child("Objects")
            .unwrap()
            .children_named("Material")
            .collect();

        let color = |name: &str, rgb: [f64; 3]| {
            let mut entry = text(&[name, "Color", "", "A"]);
            entry.extend(rgb.map(PropertyValue::Float));
            entry
        };
        let number = |name: &str, value: f64| {
            let mut entry = text(&[name, "Number", "", "A"]);
            entry.push(PropertyValue::Float(value));
            entry
        };

        assert_eq!(
            materials[0].properties,
            vec![
                PropertyValue::from(NodeId::new(3)),
                PropertyValue::from("plain"),
                PropertyValue::from("Mesh"),
            ]
        );
        let defaults = [
            color("DiffuseColor", [1.0, 1.0, 1.0]),
            color("SpecularColor", [0.0, 0.0, 0.0]),
            number("Shininess", 0.0),
            number("Opacity", 1.0),
        ];
        assert_eq!(p_entries(materials[0]), defaults.iter().map(Vec::as_slice).collect::<Vec<_>>());

        let expected = [
            color("DiffuseColor", [0.5, 0.25, 0.0]),
            color("SpecularColor", [1.0, 0.5, 0.25]),
            number("Shininess", 8.0),
            number("Opacity", 0.5),
        ];
        assert_eq!(p_entries(materials[1]), expected.iter().map(Vec::as_slice).collect::<Vec<_>>());
    }

    #[test]
    fn geometry_is_compressed_without_deformers() {
        let doc = document(&["a"], &[("a", Material::default())]);
        let meshes = RecordingMesh::default();
        let textures = RecordingTextures::default();
        SceneGraphBuilderLane
            .build(&doc, &mut IdentityAllocator::new(), &context(&meshes, &textures))
            .unwrap();
        assert_eq!(*meshes.deformer_flags.lock().unwrap(), vec![false]);
    }

    #[test]
    fn textures_connect_to_their_parts_material() {
        let doc = document(
            &["a", "b", "a"],
            &[
                ("a", textured(None, Some("a_spec.png"))),
                ("b", textured(Some("b.png"), None)),
            ],
        );
        let (scene, _) = build(&doc);

        // Materials a=3, b=4; textures 5, 6, 7 in part order.
        let targets: Vec<_> = scene
            .connections
            .edges()
            .iter()
            .filter(|e| e.property_name() == Some("DiffuseColor"))
            .map(|e| (e.source(), e.target()))
            .collect();
        assert_eq!(
            targets,
            vec![
                (NodeId::new(5), NodeId::new(3)),
                (NodeId::new(6), NodeId::new(4)),
                (NodeId::new(7), NodeId::new(3)),
            ]
        );
    }

    #[test]
    fn sole_material_is_emitted_once_whatever_parts_reference() {
        let doc = document(&["a", "b", "c"], &[("only", Material::default())]);
        let (scene, ids) = build(&doc);

        assert_eq!(ids.allocated(), 3);
        let materials: Vec<_> = scene
            .root
            .child("Objects")
            .unwrap()
            .children_named("Material")
            .collect();
        assert_eq!(materials.len(), 1);
        assert_eq!(materials[0].properties[1].as_text(), Some("only"));
    }

    #[test]
    fn identity_and_edge_counts_scale_with_materials_and_textures() {
        let doc = document(
            &["a", "b", "c"],
            &[
                ("a", textured(Some("a.png"), None)),
                ("b", textured(Some("b.png"), None)),
                ("c", textured(Some("c.png"), None)),
            ],
        );
        let (scene, ids) = build(&doc);

        // 2 + N + M
        assert_eq!(ids.allocated(), 2 + 3 + 3);
        assert_eq!(scene.connections.count(ConnectionKind::ObjectToObject), 1 + 3);
        assert_eq!(scene.connections.count(ConnectionKind::ObjectToProperty), 2 * 3);
        assert!(scene.connections.dangling(&scene.object_ids()).is_empty());
    }

    #[test]
    fn shared_material_gets_one_node_and_one_texture_per_part() {
        let doc = document(
            &["b", "a", "b"],
            &[
                ("a", textured(Some("a.png"), None)),
                ("b", textured(Some("b.png"), None)),
            ],
        );
        let (scene, ids) = build(&doc);
        assert_eq!(ids.allocated(), 2 + 2 + 3);

        let objects = scene.root.child("Objects").unwrap();
        // First-seen order: b before a.
        let materials: Vec<_> = objects.children_named("Material").collect();
        assert_eq!(materials[0].id(), Some(NodeId::new(3)));
        assert_eq!(materials[0].properties[1].as_text(), Some("b"));
        assert_eq!(materials[1].properties[1].as_text(), Some("a"));

        let op: Vec<_> = scene
            .connections
            .edges()
            .iter()
            .filter(|e| e.kind() == ConnectionKind::ObjectToProperty)
            .collect();
        assert_eq!(op[0].source(), NodeId::new(5));
        assert_eq!(op[0].target(), NodeId::new(3));
        assert_eq!(op[0].property_name(), Some("AmbientFactor"));
        assert_eq!(op[1].property_name(), Some("DiffuseColor"));
        assert_eq!(op[2].target(), NodeId::new(4));
    }

    #[test]
    fn albedo_wins_over_specular() {
        let doc = document(
            &["both", "spec"],
            &[
                ("both", textured(Some("albedo.png"), Some("spec.png"))),
                ("spec", textured(None, Some("only_spec.png"))),
            ],
        );
        let textures = RecordingTextures::default();
        let mut ids = IdentityAllocator::new();
        let scene = SceneGraphBuilderLane
            .build(&doc, &mut ids, &context(&StubMesh, &textures))
            .unwrap();

        let calls = textures.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("albedo.png".to_string(), TextureUsage::Albedo),
                ("only_spec.png".to_string(), TextureUsage::Specular),
            ]
        );

        let objects = scene.root.child("Objects").unwrap();
        let textures: Vec<_> = objects.children_named("Texture").collect();
        assert_eq!(texture_slot(textures[0]), ALBEDO_SLOT);
        assert_eq!(texture_slot(textures[1]), SPECULAR_SLOT);
        assert_eq!(
            textures[0].child("RelativeFilename").unwrap().properties[0].as_text(),
            Some("baked_albedo.png")
        );
    }

    #[test]
    fn empty_texture_names_are_not_textures() {
        let doc = document(&["a", "b"], &[("a", textured(Some(""), Some(""))), ("b", Material::default())]);
        let (scene, ids) = build(&doc);
        assert_eq!(ids.allocated(), 4);
        assert_eq!(scene.connections.count(ConnectionKind::ObjectToProperty), 0);
    }

    #[test]
    fn builds_are_deterministic() {
        let doc = document(
            &["a", "b"],
            &[("a", textured(Some("a.png"), None)), ("b", Material::default())],
        );
        let (first, _) = build(&doc);
        let (second, _) = build(&doc);

        assert_eq!(first, second);
        let lane = FbxBinaryLane::new();
        assert_eq!(
            lane.serialize(&first.root).unwrap(),
            lane.serialize(&second.root).unwrap()
        );
    }

    #[test]
    fn failures_abort_the_build() {
        let textures = RecordingTextures::default();

        let doc = document(&["x"], &[("a", Material::default()), ("b", Material::default())]);
        let err = SceneGraphBuilderLane
            .build(&doc, &mut IdentityAllocator::new(), &context(&StubMesh, &textures))
            .unwrap_err();
        assert!(matches!(err, BakeError::ParseFailed { .. }));

        let empty = GeometryDocument::default();
        let err = SceneGraphBuilderLane
            .build(&empty, &mut IdentityAllocator::new(), &context(&StubMesh, &textures))
            .unwrap_err();
        assert!(matches!(err, BakeError::ParseFailed { .. }));

        let doc = document(&["a"], &[("a", Material::default())]);
        let err = SceneGraphBuilderLane
            .build(&doc, &mut IdentityAllocator::new(), &context(&FailingMesh, &textures))
            .unwrap_err();
        assert!(matches!(err, BakeError::CompressionFailed { .. }));
    }

    #[test]
    fn texture_failure_aborts_the_build() {
        struct FailingTextures;

        impl TextureCompressor for FailingTextures {
            fn compress(
                &self,
                request: &TextureRequest<'_>,
                _usage: &dyn Fn() -> TextureUsage,
            ) -> Result<String, BakeError> {
                Err(BakeError::compression_failed(request.filename, "unreadable"))
            }
        }

        let doc = document(&["a"], &[("a", textured(Some("a.png"), None))]);
        let err = SceneGraphBuilderLane
            .build(&doc, &mut IdentityAllocator::new(), &context(&StubMesh, &FailingTextures))
            .unwrap_err();
        assert_eq!(err, BakeError::compression_failed("a.png", "unreadable"));
    }
}
