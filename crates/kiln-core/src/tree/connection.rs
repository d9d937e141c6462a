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

//! Typed edges between node identities.

use super::{Node, NodeId, PropertyValue};
use std::collections::HashSet;

/// Name of the node that holds all connection records.
pub const CONNECTIONS_NODE_NAME: &str = "Connections";
/// Name of a single connection record.
pub const CONNECTION_RECORD_NAME: &str = "C";

/// The kind of relationship an edge expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    /// An object is attached to another object (e.g. geometry → model).
    ObjectToObject,
    /// An object feeds a named property of another object
    /// (e.g. texture → material's `DiffuseColor`).
    ObjectToProperty,
}

impl ConnectionKind {
    /// The two-letter tag written as the first property of a `C` record.
    pub fn tag(self) -> &'static str {
        match self {
            ConnectionKind::ObjectToObject => "OO",
            ConnectionKind::ObjectToProperty => "OP",
        }
    }

    /// Parses a record tag back into a kind.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "OO" => Some(ConnectionKind::ObjectToObject),
            "OP" => Some(ConnectionKind::ObjectToProperty),
            _ => None,
        }
    }
}

/// A single directed edge of the [`ConnectionGraph`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    kind: ConnectionKind,
    source: NodeId,
    target: NodeId,
    property_name: Option<String>,
}

impl Connection {
    /// Creates an object-to-object edge.
    pub fn object_to_object(source: NodeId, target: NodeId) -> Self {
        Self {
            kind: ConnectionKind::ObjectToObject,
            source,
            target,
            property_name: None,
        }
    }

    /// Creates an object-to-property edge targeting `property_name` on `target`.
    pub fn object_to_property(
        source: NodeId,
        target: NodeId,
        property_name: impl Into<String>,
    ) -> Self {
        Self {
            kind: ConnectionKind::ObjectToProperty,
            source,
            target,
            property_name: Some(property_name.into()),
        }
    }

    /// The kind of this edge.
    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    /// The identity the edge starts from.
    pub fn source(&self) -> NodeId {
        self.source
    }

    /// The identity the edge points to.
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// The targeted property; always `Some` for object-to-property edges.
    pub fn property_name(&self) -> Option<&str> {
        self.property_name.as_deref()
    }

    /// Encodes the edge as a `C` record.
    pub fn to_node(&self) -> Node {
        let mut node = Node::new(CONNECTION_RECORD_NAME)
            .with_property(self.kind.tag())
            .with_property(self.source)
            .with_property(self.target);
        if let Some(name) = &self.property_name {
            node.properties.push(PropertyValue::Text(name.clone()));
        }
        node
    }

    /// Decodes a `C` record. Returns `None` if the record is malformed.
    pub fn from_node(node: &Node) -> Option<Self> {
        if node.name != CONNECTION_RECORD_NAME {
            return None;
        }
        let kind = ConnectionKind::from_tag(node.properties.first()?.as_text()?)?;
        let source = to_id(node.properties.get(1)?)?;
        let target = to_id(node.properties.get(2)?)?;
        match kind {
            ConnectionKind::ObjectToObject if node.properties.len() == 3 => {
                Some(Self::object_to_object(source, target))
            }
            ConnectionKind::ObjectToProperty if node.properties.len() == 4 => {
                let name = node.properties[3].as_text()?;
                Some(Self::object_to_property(source, target, name))
            }
            _ => None,
        }
    }
}

fn to_id(value: &PropertyValue) -> Option<NodeId> {
    value
        .as_integer()
        .and_then(|v| u64::try_from(v).ok())
        .map(NodeId::new)
}

/// The ordered list of edges of one bake.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionGraph {
    edges: Vec<Connection>,
}

impl ConnectionGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an edge. Insertion order is preserved in the output.
    pub fn push(&mut self, connection: Connection) {
        self.edges.push(connection);
    }

    /// Returns the edges in insertion order.
    pub fn edges(&self) -> &[Connection] {
        &self.edges
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph has no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Counts the edges of the given kind.
    pub fn count(&self, kind: ConnectionKind) -> usize {
        self.edges.iter().filter(|e| e.kind == kind).count()
    }

    /// Returns the edges whose source or target is not in `known`.
    ///
    /// Every edge must reference nodes of the same bake, so a well-formed graph
    /// returns an empty list.
    pub fn dangling<'a>(&'a self, known: &HashSet<NodeId>) -> Vec<&'a Connection> {
        self.edges
            .iter()
            .filter(|e| !known.contains(&e.source) || !known.contains(&e.target))
            .collect()
    }

    /// Encodes the graph as a `Connections` node with one `C` child per edge.
    pub fn to_node(&self) -> Node {
        Node {
            name: CONNECTIONS_NODE_NAME.to_string(),
            properties: Vec::new(),
            children: self.edges.iter().map(Connection::to_node).collect(),
        }
    }

    /// Decodes a `Connections` node, skipping malformed records.
    pub fn from_node(node: &Node) -> Self {
        let edges = node
            .children
            .iter()
            .filter_map(|child| {
                let edge = Connection::from_node(child);
                if edge.is_none() {
                    log::warn!("Skipping malformed connection record: {:?}", child);
                }
                edge
            })
            .collect();
        Self { edges }
    }
}
