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

//! Bake requests, the per-session state machine, and the completion report.

use super::{AssetReference, BakeError, IngestOptions};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The stages a bake session moves through.
///
/// The happy path is strictly linear; [`BakeStage::Failed`] is reachable from
/// every non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BakeStage {
    /// Created, not started.
    Idle,
    /// Copying or downloading the input.
    Acquiring,
    /// Parsing the working copy into a geometry document.
    Ingesting,
    /// Building the node tree and connection graph.
    Building,
    /// Encoding the tree.
    Serializing,
    /// Writing the artifact.
    Writing,
    /// Finished successfully.
    Done,
    /// Finished with an error.
    Failed,
}

impl BakeStage {
    /// The stage that follows this one on success, if any.
    pub fn next(self) -> Option<BakeStage> {
        match self {
            BakeStage::Idle => Some(BakeStage::Acquiring),
            BakeStage::Acquiring => Some(BakeStage::Ingesting),
            BakeStage::Ingesting => Some(BakeStage::Building),
            BakeStage::Building => Some(BakeStage::Serializing),
            BakeStage::Serializing => Some(BakeStage::Writing),
            BakeStage::Writing => Some(BakeStage::Done),
            BakeStage::Done | BakeStage::Failed => None,
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, BakeStage::Done | BakeStage::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: BakeStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == BakeStage::Failed || self.next() == Some(next)
    }
}

/// The filesystem locations a bake works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BakeDirectories {
    /// Where the working copy of the input is placed.
    pub working: PathBuf,
    /// Where the baked artifact and re-encoded textures are written.
    pub output: PathBuf,
    /// If set, an unmodified copy of the input is mirrored here.
    pub original_mirror: Option<PathBuf>,
}

/// Everything needed to start one bake.
#[derive(Debug, Clone)]
pub struct BakeRequest {
    /// The input to bake.
    pub reference: AssetReference,
    /// Working and output locations.
    pub directories: BakeDirectories,
    /// Options forwarded to the ingestor.
    pub ingest: IngestOptions,
}

impl BakeRequest {
    /// Creates a request with default ingest options.
    pub fn new(reference: AssetReference, directories: BakeDirectories) -> Self {
        Self {
            reference,
            directories,
            ingest: IngestOptions::default(),
        }
    }
}

/// A shared flag a requester can set to stop a bake between stages.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Stages already running finish; no new stage starts.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// The mutable state of one bake, owned by the orchestrator.
#[derive(Debug)]
pub struct BakeSession {
    request: BakeRequest,
    stage: BakeStage,
    history: Vec<BakeStage>,
    working_copy: Option<PathBuf>,
    errors: Vec<String>,
    failure: Option<BakeError>,
    output_files: Vec<PathBuf>,
}

impl BakeSession {
    /// Creates an idle session for `request`.
    pub fn new(request: BakeRequest) -> Self {
        Self {
            request,
            stage: BakeStage::Idle,
            history: vec![BakeStage::Idle],
            working_copy: None,
            errors: Vec::new(),
            failure: None,
            output_files: Vec::new(),
        }
    }

    /// The request this session serves.
    pub fn request(&self) -> &BakeRequest {
        &self.request
    }

    /// The current stage.
    pub fn stage(&self) -> BakeStage {
        self.stage
    }

    /// The local copy of the input, once acquired.
    pub fn working_copy(&self) -> Option<&PathBuf> {
        self.working_copy.as_ref()
    }

    /// Records where the acquirer placed the input.
    pub fn set_working_copy(&mut self, path: PathBuf) {
        self.working_copy = Some(path);
    }

    /// Moves to `next`. Returns `false` and leaves the session untouched if the
    /// transition is illegal.
    pub fn advance(&mut self, next: BakeStage) -> bool {
        if !self.stage.can_transition_to(next) {
            log::error!(
                "Rejected bake transition {:?} -> {:?} for {}",
                self.stage,
                next,
                self.request.reference
            );
            return false;
        }
        log::debug!(
            "Bake {}: {:?} -> {:?}",
            self.request.reference,
            self.stage,
            next
        );
        self.stage = next;
        self.history.push(next);
        true
    }

    /// Records `error` and moves to [`BakeStage::Failed`].
    ///
    /// Only the first failure is kept; a session that already finished is left as is.
    pub fn fail(&mut self, error: BakeError) {
        if self.stage.is_terminal() {
            return;
        }
        log::error!("Bake of {} failed: {}", self.request.reference, error);
        self.errors.push(error.to_string());
        self.failure = Some(error);
        self.advance(BakeStage::Failed);
    }

    /// Records a produced artifact.
    pub fn push_output(&mut self, path: PathBuf) {
        self.output_files.push(path);
    }

    /// Consumes the session into its completion report.
    pub fn into_report(self) -> BakeReport {
        BakeReport {
            reference: self.request.reference.to_string(),
            errors: self.errors,
            output_files: self.output_files,
            failure: self.failure,
            stages: self.history,
        }
    }
}

/// What the requester receives, exactly once, when a bake finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct BakeReport {
    /// The input reference, as text.
    pub reference: String,
    /// Human-readable errors; empty on success.
    pub errors: Vec<String>,
    /// Produced artifacts; one entry on success, empty on failure.
    pub output_files: Vec<PathBuf>,
    /// The error that stopped the bake, if any.
    pub failure: Option<BakeError>,
    /// Every stage the session entered, in order.
    pub stages: Vec<BakeStage>,
}

impl BakeReport {
    /// Whether the bake produced its artifact without errors.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.stages.last() == Some(&BakeStage::Done)
    }

    /// Whether the session ever entered `stage`.
    pub fn reached(&self, stage: BakeStage) -> bool {
        self.stages.contains(&stage)
    }
}
