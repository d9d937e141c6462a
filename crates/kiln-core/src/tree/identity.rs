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

//! Node identities and the session-scoped allocator that hands them out.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The identity of an object node within one bake.
///
/// Identities are unique for the lifetime of a single bake and are used by
/// connections to refer to nodes. Their allocation order is part of the output
/// format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Wraps a raw identity value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identity value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the identity as the signed integer stored in node properties.
    ///
    /// Allocators never come close to `i64::MAX`, so the cast is lossless in practice.
    pub const fn as_i64(self) -> i64 {
        self.0 as i64
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues strictly increasing [`NodeId`]s for one bake session.
///
/// Each session owns its own allocator and passes it explicitly to the scene
/// graph builder, so concurrent bakes never interfere with each other's numbering.
#[derive(Debug, Clone)]
pub struct IdentityAllocator {
    next: u64,
    allocated: usize,
}

impl IdentityAllocator {
    /// The first identity handed out by [`IdentityAllocator::new`].
    ///
    /// `0` is reserved: consumers of the format use it for the implicit scene root.
    pub const FIRST_ID: u64 = 1;

    /// Creates an allocator starting at [`IdentityAllocator::FIRST_ID`].
    pub fn new() -> Self {
        Self::starting_at(Self::FIRST_ID)
    }

    /// Creates an allocator whose first identity is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: first,
            allocated: 0,
        }
    }

    /// Returns the next identity and advances the counter.
    pub fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        self.allocated += 1;
        id
    }

    /// Returns how many identities this allocator has issued.
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    /// Returns the identity the next call to [`allocate`](Self::allocate) will produce.
    pub fn peek(&self) -> NodeId {
        NodeId(self.next)
    }
}

impl Default for IdentityAllocator {
    fn default() -> Self {
        Self::new()
    }
}
