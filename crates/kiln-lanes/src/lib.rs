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

//! # Kiln Lanes
//!
//! Concrete, swappable implementations of every stage of the baking pipeline.
//! Each lane implements one of the contracts from `kiln_core::bake`, so the
//! bake agent can compose them without knowing which backend is in use.

#![warn(missing_docs)]

pub mod acquire_lane;
pub mod compression_lane;
pub mod ingest_lane;
pub mod scene_lane;
pub mod serialization_lane;
