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

//! The generic tagged tree used as both the intermediate and the output
//! representation of a baked scene.
//!
//! A [`Node`] is a name, an ordered list of typed [`PropertyValue`]s and an
//! ordered list of owned children. Order is significant everywhere: consumers of
//! the baked format reconstruct the graph by position.

mod connection;
mod identity;

pub use connection::*;
pub use identity::*;

/// A single typed value attached to a [`Node`].
///
/// This is a closed set: every value the binary format can carry maps to
/// exactly one variant, and each variant maps to exactly one type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// A UTF-8 string.
    Text(String),
    /// A signed 64-bit integer. Node identities are stored this way.
    Integer(i64),
    /// A 64-bit float.
    Float(f64),
    /// An opaque byte payload, e.g. a compressed mesh.
    Blob(Vec<u8>),
}

impl PropertyValue {
    /// Returns the string if this is a [`PropertyValue::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is a [`PropertyValue::Integer`].
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the float if this is a [`PropertyValue::Float`].
    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the bytes if this is a [`PropertyValue::Blob`].
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            PropertyValue::Blob(b) => Some(b),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<f32> for PropertyValue {
    fn from(value: f32) -> Self {
        PropertyValue::Float(f64::from(value))
    }
}

impl From<NodeId> for PropertyValue {
    fn from(value: NodeId) -> Self {
        PropertyValue::Integer(value.as_i64())
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(value: Vec<u8>) -> Self {
        PropertyValue::Blob(value)
    }
}

/// A named node owning its properties and children.
///
/// The tree has no sharing and no cycles: a node exclusively owns its children.
/// The document root is a node with an empty name whose own name and properties
/// are never serialized; only its children are.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    /// The node's tag, e.g. `"Geometry"` or `"P"`.
    pub name: String,
    /// Ordered property values.
    pub properties: Vec<PropertyValue>,
    /// Ordered, owned child nodes.
    pub children: Vec<Node>,
}

impl Node {
    /// Creates an empty node with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Creates an unnamed document root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Appends a property and returns the node, for chained construction.
    pub fn with_property(mut self, value: impl Into<PropertyValue>) -> Self {
        self.properties.push(value.into());
        self
    }

    /// Appends several properties in order.
    pub fn with_properties<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<PropertyValue>,
    {
        self.properties.extend(values.into_iter().map(Into::into));
        self
    }

    /// Appends a child and returns the node, for chained construction.
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Appends a child in place.
    pub fn push_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// Returns the first direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Iterates over the direct children with the given name, in order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Returns the identity stored in the first property, if it is an integer.
    ///
    /// Object nodes (`Geometry`, `Model`, `Material`, `Texture`) carry their
    /// identity there.
    pub fn id(&self) -> Option<NodeId> {
        self.properties
            .first()
            .and_then(PropertyValue::as_integer)
            .and_then(|v| u64::try_from(v).ok())
            .map(NodeId::new)
    }

    /// Counts this node and all of its descendants.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Node::node_count).sum::<usize>()
    }
}
