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

//! Handle to a bake running in the background.

use anyhow::{Context, Result};
use kiln_core::bake::{BakeReport, CancellationToken};
use tokio::sync::oneshot;

/// Returned by [`BakeAgent::spawn`](super::BakeAgent::spawn).
///
/// The report is delivered exactly once, through [`BakeHandle::wait`].
#[derive(Debug)]
pub struct BakeHandle {
    receiver: oneshot::Receiver<BakeReport>,
    token: CancellationToken,
}

impl BakeHandle {
    pub(crate) fn new(receiver: oneshot::Receiver<BakeReport>, token: CancellationToken) -> Self {
        Self { receiver, token }
    }

    /// Requests cancellation. Takes effect before the next stage starts.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The token observed by the running session.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Waits for the session to finish and returns its report.
    pub async fn wait(self) -> Result<BakeReport> {
        self.receiver
            .await
            .context("Bake task ended without reporting")
    }
}
