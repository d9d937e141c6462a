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

use crate::helpers::*;
use anyhow::{Context, Result};
use kiln_core::bake::TreeSerializer;
use kiln_core::tree::{ConnectionGraph, ConnectionKind, Node, PropertyValue, CONNECTIONS_NODE_NAME};
use kiln_lanes::serialization_lane::FbxBinaryLane;
use std::fmt::Write;
use std::fs;
use std::path::Path;

/// Prints the node tree of a baked artifact.
pub fn run(path: &Path) -> Result<()> {
    print_task_start("Inspecting Artifact", MAGNIFIER, CYAN);

    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read artifact '{}'", path.display()))?;
    let root = FbxBinaryLane::new()
        .deserialize(&bytes)
        .with_context(|| format!("Failed to decode '{}'", path.display()))?;

    print!("{}", render_tree(&root));

    if let Some(node) = root.child(CONNECTIONS_NODE_NAME) {
        let graph = ConnectionGraph::from_node(node);
        println!(
            "{}{}Connections:{} {} object-object, {} object-property",
            BOLD,
            YELLOW,
            RESET,
            graph.count(ConnectionKind::ObjectToObject),
            graph.count(ConnectionKind::ObjectToProperty)
        );
    }

    print_success(&format!(
        "{} node(s), {} bytes",
        root.node_count(),
        bytes.len()
    ));
    Ok(())
}

/// Renders the children of `root` as an indented outline.
pub fn render_tree(root: &Node) -> String {
    let mut out = String::new();
    for child in &root.children {
        render_node(child, 0, &mut out);
    }
    out
}

fn render_node(node: &Node, depth: usize, out: &mut String) {
    let properties: Vec<String> = node.properties.iter().map(describe).collect();
    let _ = writeln!(
        out,
        "{:indent$}{}: [{}]",
        "",
        node.name,
        properties.join(", "),
        indent = depth * 2
    );
    for child in &node.children {
        render_node(child, depth + 1, out);
    }
}

fn describe(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Text(text) => format!("{text:?}"),
        PropertyValue::Integer(value) => value.to_string(),
        PropertyValue::Float(value) => format!("{value:?}"),
        PropertyValue::Blob(bytes) => format!("<{} bytes>", bytes.len()),
    }
}
