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

//! Encodes node trees as FBX 7.5 binary node records.
//!
//! Layout:
//! - a 27-byte header: [`HEADER_MAGIC_BYTES`] followed by the version as a LE `u32`,
//! - one record per child of the root, in order,
//! - a null record closing the top-level list.
//!
//! A record is `end_offset: u64`, `property_count: u64`, `property_bytes: u64`,
//! `name_len: u8`, the name, the properties, the child records, and a null record
//! if the node has children. `end_offset` is absolute from the start of the file.

use kiln_core::bake::{DecodeError, EncodeError, TreeSerializer};
use kiln_core::tree::{Node, PropertyValue};
use std::convert::TryInto;

/// Identifies a binary FBX file.
pub const HEADER_MAGIC_BYTES: [u8; 23] = *b"Kaydara FBX Binary  \x00\x1a\x00";
/// The only format version this lane writes and reads.
pub const FORMAT_VERSION: u32 = 7500;
/// Size of the file header.
pub const HEADER_SIZE: usize = HEADER_MAGIC_BYTES.len() + 4;
/// Size of a null record: three zeroed `u64`s and a zero name length.
const NULL_RECORD_SIZE: usize = 8 * 3 + 1;
const MAX_NAME_LEN: usize = u8::MAX as usize;
/// Deepest record nesting the decoder accepts; top-level records are at depth 1.
pub const MAX_RECORD_DEPTH: usize = 64;

const TAG_TEXT: u8 = b'S';
const TAG_BLOB: u8 = b'R';
const TAG_INTEGER: u8 = b'L';
const TAG_FLOAT: u8 = b'D';

/// Serializer for the baked `.fbx` artifact.
#[derive(Debug, Clone, Copy, Default)]
pub struct FbxBinaryLane;

impl FbxBinaryLane {
    /// Creates a new `FbxBinaryLane`.
    pub fn new() -> Self {
        Self
    }
}

impl TreeSerializer for FbxBinaryLane {
    fn format_extension(&self) -> &'static str {
        "fbx"
    }

    fn serialize(&self, root: &Node) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::with_capacity(HEADER_SIZE + root.node_count() * 64);
        out.extend_from_slice(&HEADER_MAGIC_BYTES);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());

        for child in &root.children {
            write_record(&mut out, child)?;
        }
        out.extend_from_slice(&[0u8; NULL_RECORD_SIZE]);
        Ok(out)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Node, DecodeError> {
        if bytes.len() < HEADER_SIZE || bytes[..HEADER_MAGIC_BYTES.len()] != HEADER_MAGIC_BYTES {
            return Err(DecodeError::InvalidMagic);
        }
        let mut reader = RecordReader {
            data: bytes,
            position: HEADER_MAGIC_BYTES.len(),
        };
        let version = reader.read_u32()?;
        if version != FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        let mut root = Node::root();
        while let Some(node) = reader.read_record(1)? {
            root.children.push(node);
        }
        Ok(root)
    }
}

/// Names longer than a record can describe are cut at a char boundary.
fn record_name(name: &str) -> &str {
    if name.len() <= MAX_NAME_LEN {
        return name;
    }
    let mut end = MAX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

fn write_record(out: &mut Vec<u8>, node: &Node) -> Result<(), EncodeError> {
    let start = out.len();
    // end_offset, property_count, property_bytes are patched once known.
    out.extend_from_slice(&[0u8; 24]);

    let name = record_name(&node.name);
    out.push(name.len() as u8);
    out.extend_from_slice(name.as_bytes());

    let properties_start = out.len();
    for (index, property) in node.properties.iter().enumerate() {
        write_property(out, property)
            .map_err(|len| EncodeError::PropertyTooLarge {
                node: node.name.clone(),
                index,
                len,
                max: u32::MAX as usize,
            })?;
    }
    let properties_len = out.len() - properties_start;

    for child in &node.children {
        write_record(out, child)?;
    }
    if !node.children.is_empty() {
        out.extend_from_slice(&[0u8; NULL_RECORD_SIZE]);
    }

    let end = out.len() as u64;
    out[start..start + 8].copy_from_slice(&end.to_le_bytes());
    out[start + 8..start + 16].copy_from_slice(&(node.properties.len() as u64).to_le_bytes());
    out[start + 16..start + 24].copy_from_slice(&(properties_len as u64).to_le_bytes());
    Ok(())
}

/// The `u32` length prefix of a string or blob, or the length if it does not fit.
fn length_prefix(len: usize) -> Result<[u8; 4], usize> {
    u32::try_from(len).map(u32::to_le_bytes).map_err(|_| len)
}

/// Appends one property. Fails with the payload length if it is too long.
fn write_property(out: &mut Vec<u8>, property: &PropertyValue) -> Result<(), usize> {
    match property {
        PropertyValue::Text(text) => {
            let prefix = length_prefix(text.len())?;
            out.push(TAG_TEXT);
            out.extend_from_slice(&prefix);
            out.extend_from_slice(text.as_bytes());
        }
        PropertyValue::Blob(bytes) => {
            let prefix = length_prefix(bytes.len())?;
            out.push(TAG_BLOB);
            out.extend_from_slice(&prefix);
            out.extend_from_slice(bytes);
        }
        PropertyValue::Integer(value) => {
            out.push(TAG_INTEGER);
            out.extend_from_slice(&value.to_le_bytes());
        }
        PropertyValue::Float(value) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    Ok(())
}

struct RecordReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> RecordReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(DecodeError::UnexpectedEof(self.position))?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let position = self.position;
        self.take(N)?
            .try_into()
            .map_err(|_| DecodeError::UnexpectedEof(position))
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take_array::<1>()?[0])
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    fn corrupted(&self, offset: usize, reason: impl Into<String>) -> DecodeError {
        DecodeError::Corrupted {
            offset,
            reason: reason.into(),
        }
    }

    /// Reads one record at nesting `depth`, or `None` on a null record.
    fn read_record(&mut self, depth: usize) -> Result<Option<Node>, DecodeError> {
        let start = self.position;
        if depth > MAX_RECORD_DEPTH {
            return Err(self.corrupted(
                start,
                format!("records nested deeper than {MAX_RECORD_DEPTH}"),
            ));
        }
        let end = self.read_u64()? as usize;
        let property_count = self.read_u64()?;
        let properties_len = self.read_u64()? as usize;
        let name_len = self.read_u8()? as usize;

        if end == 0 {
            if property_count != 0 || properties_len != 0 || name_len != 0 {
                return Err(self.corrupted(start, "non-zero fields in null record"));
            }
            return Ok(None);
        }
        if end <= start || end > self.data.len() {
            return Err(self.corrupted(start, format!("end offset {end} out of range")));
        }

        let name = std::str::from_utf8(self.take(name_len)?)
            .map_err(|_| self.corrupted(start, "record name is not UTF-8"))?
            .to_string();

        let properties_start = self.position;
        let mut properties = Vec::new();
        for _ in 0..property_count {
            properties.push(self.read_property()?);
        }
        if self.position - properties_start != properties_len {
            return Err(self.corrupted(start, "property byte length mismatch"));
        }

        let mut children = Vec::new();
        while self.position < end {
            match self.read_record(depth + 1)? {
                Some(child) => children.push(child),
                None => break,
            }
        }
        if self.position != end {
            return Err(self.corrupted(start, "children overrun the record"));
        }

        Ok(Some(Node {
            name,
            properties,
            children,
        }))
    }

    fn read_property(&mut self) -> Result<PropertyValue, DecodeError> {
        let offset = self.position;
        let tag = self.read_u8()?;
        let value = match tag {
            TAG_TEXT => {
                let len = self.read_u32()? as usize;
                let text = std::str::from_utf8(self.take(len)?)
                    .map_err(|_| self.corrupted(offset, "string property is not UTF-8"))?;
                PropertyValue::Text(text.to_string())
            }
            TAG_BLOB => {
                let len = self.read_u32()? as usize;
                PropertyValue::Blob(self.take(len)?.to_vec())
            }
            TAG_INTEGER => PropertyValue::Integer(i64::from_le_bytes(self.take_array()?)),
            TAG_FLOAT => PropertyValue::Float(f64::from_le_bytes(self.take_array()?)),
            // Narrower scalar types other writers emit.
            b'I' => PropertyValue::Integer(i64::from(i32::from_le_bytes(self.take_array()?))),
            b'Y' => PropertyValue::Integer(i64::from(i16::from_le_bytes(self.take_array()?))),
            b'C' => PropertyValue::Integer(i64::from(self.read_u8()?)),
            b'F' => PropertyValue::Float(f64::from(f32::from_le_bytes(self.take_array()?))),
            other => {
                return Err(DecodeError::UnknownPropertyType {
                    tag: other as char,
                    offset,
                })
            }
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Node {
        Node::root()
            .with_child(
                Node::new("GlobalSettings").with_child(
                    Node::new("Properties70").with_child(
                        Node::new("P")
                            .with_properties(["UnitScaleFactor", "double", "Number", ""])
                            .with_property(100.0f64),
                    ),
                ),
            )
            .with_child(
                Node::new("Objects").with_child(
                    Node::new("Geometry")
                        .with_property(1i64)
                        .with_child(Node::new("CompressedMesh").with_property(vec![1u8, 2, 3])),
                ),
            )
            .with_child(Node::new("Connections"))
    }

    #[test]
    fn header_and_trailer_layout() {
        let bytes = FbxBinaryLane.serialize(&Node::root()).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + NULL_RECORD_SIZE);
        assert_eq!(&bytes[..23], &HEADER_MAGIC_BYTES);
        assert_eq!(u32::from_le_bytes(bytes[23..27].try_into().unwrap()), 7500);
        assert!(bytes[HEADER_SIZE..].iter().all(|b| *b == 0));
    }

    #[test]
    fn leaf_record_layout() {
        let root = Node::root().with_child(Node::new("C").with_property("OO"));
        let bytes = FbxBinaryLane.serialize(&root).unwrap();
        let record = &bytes[HEADER_SIZE..];

        let end = u64::from_le_bytes(record[0..8].try_into().unwrap());
        let count = u64::from_le_bytes(record[8..16].try_into().unwrap());
        let props_len = u64::from_le_bytes(record[16..24].try_into().unwrap());
        // 25 bytes of header + 1 byte name + (1 tag + 4 len + 2 chars).
        assert_eq!(end as usize, HEADER_SIZE + 25 + 1 + 7);
        assert_eq!(count, 1);
        assert_eq!(props_len, 7);
        assert_eq!(record[24], 1);
        assert_eq!(record[25], b'C');
        assert_eq!(record[26], b'S');
    }

    #[test]
    fn decoding_restores_the_tree() {
        let tree = sample_tree();
        let bytes = FbxBinaryLane.serialize(&tree).unwrap();
        assert_eq!(FbxBinaryLane.deserialize(&bytes).unwrap(), tree);
    }

    #[test]
    fn encoding_is_deterministic() {
        let tree = sample_tree();
        assert_eq!(
            FbxBinaryLane.serialize(&tree).unwrap(),
            FbxBinaryLane.serialize(&tree).unwrap()
        );
    }

    #[test]
    fn overlong_names_are_truncated() {
        let root = Node::root().with_child(Node::new("é".repeat(200)));
        let decoded = FbxBinaryLane
            .deserialize(&FbxBinaryLane.serialize(&root).unwrap())
            .unwrap();
        let name = &decoded.children[0].name;
        assert!(name.len() <= 255);
        assert_eq!(name.chars().count(), 127);
    }

    #[test]
    fn rejects_foreign_and_truncated_input() {
        assert_eq!(
            FbxBinaryLane.deserialize(b"not a scene"),
            Err(DecodeError::InvalidMagic)
        );

        let mut bytes = FbxBinaryLane.serialize(&sample_tree()).unwrap();
        bytes[23..27].copy_from_slice(&7400u32.to_le_bytes());
        assert_eq!(
            FbxBinaryLane.deserialize(&bytes),
            Err(DecodeError::UnsupportedVersion(7400))
        );

        let bytes = FbxBinaryLane.serialize(&sample_tree()).unwrap();
        let truncated = &bytes[..bytes.len() - 40];
        assert!(FbxBinaryLane.deserialize(truncated).is_err());
    }

    fn nested(depth: usize) -> Node {
        let mut node = Node::new("N");
        for _ in 1..depth {
            node = Node::new("N").with_child(node);
        }
        Node::root().with_child(node)
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let at_limit = nested(MAX_RECORD_DEPTH);
        let bytes = FbxBinaryLane.serialize(&at_limit).unwrap();
        assert_eq!(FbxBinaryLane.deserialize(&bytes).unwrap(), at_limit);

        let bytes = FbxBinaryLane.serialize(&nested(MAX_RECORD_DEPTH + 1)).unwrap();
        match FbxBinaryLane.deserialize(&bytes) {
            Err(DecodeError::Corrupted { reason, .. }) => assert!(reason.contains("nested")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn lengths_beyond_u32_are_rejected() {
        assert_eq!(length_prefix(7), Ok(7u32.to_le_bytes()));
        assert_eq!(length_prefix(u32::MAX as usize), Ok(u32::MAX.to_le_bytes()));
        let too_long = u32::MAX as usize + 1;
        assert_eq!(length_prefix(too_long), Err(too_long));
    }
}
