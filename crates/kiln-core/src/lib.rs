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

//! # Kiln Core
//!
//! Foundational crate containing the data types and interface contracts shared
//! by every stage of the asset-baking pipeline.
//!
//! - [`tree`]: the tagged node tree, node identities and the connection graph.
//! - [`geometry`]: the structured geometry document produced by ingestion.
//! - [`bake`]: collaborator traits, the error taxonomy and bake session state.

#![warn(missing_docs)]

pub mod bake;
pub mod geometry;
pub mod tree;

pub use bake::{BakeError, BakeReport, BakeStage};
pub use tree::{Node, NodeId, PropertyValue};
