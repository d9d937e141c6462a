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

//! Contracts and shared state of a bake.
//!
//! This module holds everything the pipeline stages agree on without knowing
//! about each other: the collaborator traits implemented by lanes, the error
//! taxonomy, the input reference type, and the session state machine driven by
//! the bake agent.

mod contracts;
mod error;
mod reference;
mod session;

pub use contracts::*;
pub use error::*;
pub use reference::*;
pub use session::*;
