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

//! The BakeAgent sequences the lanes of one bake and reports its outcome.
//!
//! A session moves `Idle -> Acquiring -> Ingesting -> Building -> Serializing
//! -> Writing -> Done`, or to `Failed` from any of them. Only the download of a
//! remote input suspends; the CPU-bound stages run on the blocking pool so the
//! caller's runtime keeps turning.

use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::Result;
use kiln_core::bake::{
    AssetReference, BakeError, BakeReport, BakeRequest, BakeSession, BakeStage,
    CancellationToken, GeometryIngestor, MeshCompressor, TextureCompressor, TreeSerializer,
};
use kiln_core::tree::IdentityAllocator;
use kiln_lanes::acquire_lane::AcquisitionLane;
use kiln_lanes::compression_lane::{ImageTextureLane, Lz4MeshCompressionLane};
use kiln_lanes::ingest_lane::ObjIngestLane;
use kiln_lanes::scene_lane::{BakedScene, SceneBuildContext, SceneGraphBuilderLane};
use kiln_lanes::serialization_lane::FbxBinaryLane;
use tokio::task::JoinError;

use super::BakeHandle;

/// Infix between the base name and the format extension of baked artifacts.
pub const BAKED_INFIX: &str = "baked";

/// The lanes a [`BakeAgent`] drives.
#[derive(Clone)]
pub struct BakeCollaborators {
    /// Brings the input onto the local filesystem.
    pub acquisition: AcquisitionLane,
    /// Parses the working copy.
    pub ingestor: Arc<dyn GeometryIngestor>,
    /// Compresses the geometry payload.
    pub mesh_compressor: Arc<dyn MeshCompressor>,
    /// Re-encodes material textures.
    pub texture_compressor: Arc<dyn TextureCompressor>,
    /// Encodes the built tree.
    pub serializer: Arc<dyn TreeSerializer>,
}

impl BakeCollaborators {
    /// The default lanes: HTTP download, OBJ ingestion, LZ4 meshes, PNG
    /// textures and FBX binary output.
    pub fn with_defaults() -> Result<Self> {
        Ok(Self {
            acquisition: AcquisitionLane::with_http()?,
            ingestor: Arc::new(ObjIngestLane::new()),
            mesh_compressor: Arc::new(Lz4MeshCompressionLane::new()),
            texture_compressor: Arc::new(ImageTextureLane::new()),
            serializer: Arc::new(FbxBinaryLane::new()),
        })
    }
}

/// Drives bake sessions. Cheap to clone; clones share the in-flight set.
#[derive(Clone)]
pub struct BakeAgent {
    lanes: BakeCollaborators,
    builder: SceneGraphBuilderLane,
    in_flight: Arc<Mutex<HashSet<AssetReference>>>,
}

/// Removes a reference from the in-flight set when the session ends.
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<AssetReference>>>,
    reference: AssetReference,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(&self.reference);
        }
    }
}

impl BakeAgent {
    /// Creates an agent driving `lanes`.
    pub fn new(lanes: BakeCollaborators) -> Self {
        Self {
            lanes,
            builder: SceneGraphBuilderLane::new(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Creates an agent with [`BakeCollaborators::with_defaults`].
    pub fn with_defaults() -> Result<Self> {
        Ok(Self::new(BakeCollaborators::with_defaults()?))
    }

    /// Where the artifact for `reference` is written.
    pub fn output_path(&self, reference: &AssetReference, output_dir: &Path) -> PathBuf {
        let base = reference.base_name().unwrap_or_else(|| "asset".to_string());
        output_dir.join(format!(
            "{base}.{BAKED_INFIX}.{}",
            self.lanes.serializer.format_extension()
        ))
    }

    /// Runs one session on the tokio runtime and returns its handle.
    pub fn spawn(&self, request: BakeRequest) -> BakeHandle {
        let token = CancellationToken::new();
        let (sender, receiver) = tokio::sync::oneshot::channel();
        let agent = self.clone();
        let task_token = token.clone();
        tokio::spawn(async move {
            let report = agent.bake(request, &task_token).await;
            // The requester may have dropped the handle.
            let _ = sender.send(report);
        });
        BakeHandle::new(receiver, token)
    }

    /// Runs one session to completion and returns its report.
    ///
    /// Never fails: every error ends up in the report.
    pub async fn bake(&self, request: BakeRequest, token: &CancellationToken) -> BakeReport {
        let started = Instant::now();
        let mut session = BakeSession::new(request);
        let reference = session.request().reference.clone();

        let Some(_guard) = self.begin(&reference) else {
            session.fail(BakeError::AlreadyInProgress {
                reference: reference.to_string(),
            });
            return session.into_report();
        };

        log::info!("Baking {}", reference);
        match self.run(&mut session, token).await {
            Ok(()) => log::info!(
                "Baked {} in {:.2?}",
                reference,
                started.elapsed()
            ),
            Err(error) => session.fail(error),
        }
        session.into_report()
    }

    fn begin(&self, reference: &AssetReference) -> Option<InFlightGuard> {
        let mut set = self.in_flight.lock().ok()?;
        if !set.insert(reference.clone()) {
            return None;
        }
        Some(InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            reference: reference.clone(),
        })
    }

    async fn run(
        &self,
        session: &mut BakeSession,
        token: &CancellationToken,
    ) -> Result<(), BakeError> {
        let request = session.request().clone();
        let reference_text = request.reference.to_string();

        // Acquiring
        enter(session, BakeStage::Acquiring, token)?;
        let stage_start = Instant::now();
        let working_copy = self
            .lanes
            .acquisition
            .acquire(&request.reference, &request.directories)
            .await?;
        session.set_working_copy(working_copy.clone());
        log::debug!("Acquired {} in {:.2?}", reference_text, stage_start.elapsed());

        let output = self.output_path(&request.reference, &request.directories.output);

        // Ingesting
        enter(session, BakeStage::Ingesting, token)?;
        let stage_start = Instant::now();
        let ingestor = Arc::clone(&self.lanes.ingestor);
        let options = request.ingest.clone();
        let source = request.reference.clone();
        let reference_for_parse = reference_text.clone();
        let working_copy_for_parse = working_copy.clone();
        let document = tokio::task::spawn_blocking(move || {
            let bytes = std::fs::read(&working_copy_for_parse)
                .map_err(|e| BakeError::parse_failed(&reference_for_parse, e))?;
            ingestor.parse(&bytes, &options, true, &source)
        })
        .await
        .map_err(|e| task_failed(BakeStage::Ingesting, &reference_text, &output, e))??;
        log::debug!("Ingested {} in {:.2?}", reference_text, stage_start.elapsed());

        // Building
        enter(session, BakeStage::Building, token)?;
        let stage_start = Instant::now();
        let texture_source_dir = texture_source_dir(&request.reference, &working_copy);
        let output_dir = request.directories.output.clone();
        let lanes = self.lanes.clone();
        let builder = self.builder;
        let reference_for_build = reference_text.clone();
        let scene: BakedScene = tokio::task::spawn_blocking(move || {
            let mut ids = IdentityAllocator::new();
            let context = SceneBuildContext {
                reference: &reference_for_build,
                mesh_compressor: lanes.mesh_compressor.as_ref(),
                texture_compressor: lanes.texture_compressor.as_ref(),
                texture_source_dir: &texture_source_dir,
                output_dir: &output_dir,
            };
            builder.build(&document, &mut ids, &context)
        })
        .await
        .map_err(|e| task_failed(BakeStage::Building, &reference_text, &output, e))??;
        log::debug!("Built {} in {:.2?}", reference_text, stage_start.elapsed());

        // Serializing, ending with the artifact opened for writing
        enter(session, BakeStage::Serializing, token)?;
        let serializer = Arc::clone(&self.lanes.serializer);
        let root = scene.root;
        let target = output.clone();
        let (encoded, file) = tokio::task::spawn_blocking(move || {
            let encoded = serializer
                .serialize(&root)
                .map_err(|e| BakeError::write_failed(&target, e))?;
            let file = open_artifact(&target)?;
            Ok::<_, BakeError>((encoded, file))
        })
        .await
        .map_err(|e| task_failed(BakeStage::Serializing, &reference_text, &output, e))??;

        // Writing
        if let Err(cancelled) = enter(session, BakeStage::Writing, token) {
            drop(file);
            discard_artifact(&output);
            return Err(cancelled);
        }
        let target = output.clone();
        let written = encoded.len();
        tokio::task::spawn_blocking(move || write_artifact(file, &target, &encoded))
            .await
            .map_err(|e| {
                discard_artifact(&output);
                task_failed(BakeStage::Writing, &reference_text, &output, e)
            })??;
        log::info!("Wrote {} ({} bytes)", output.display(), written);
        session.push_output(output);

        session.advance(BakeStage::Done);
        Ok(())
    }
}

/// Checks for cancellation, then moves the session to `next`.
fn enter(
    session: &mut BakeSession,
    next: BakeStage,
    token: &CancellationToken,
) -> Result<(), BakeError> {
    if token.is_cancelled() {
        return Err(BakeError::Cancelled { stage: next });
    }
    session.advance(next);
    Ok(())
}

/// Local inputs resolve textures next to the source; remote ones next to
/// their working copy.
fn texture_source_dir(reference: &AssetReference, working_copy: &Path) -> PathBuf {
    reference
        .local_directory()
        .or_else(|| working_copy.parent())
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Maps a stage task that panicked or was aborted to the error of that stage.
fn task_failed(stage: BakeStage, reference: &str, output: &Path, err: JoinError) -> BakeError {
    log::error!("{:?} task for {} did not complete: {}", stage, reference, err);
    match stage {
        BakeStage::Ingesting => BakeError::parse_failed(reference, err),
        BakeStage::Building => BakeError::compression_failed(reference, err),
        _ => BakeError::write_failed(output, err),
    }
}

/// Creates the artifact file and its parent directories.
fn open_artifact(path: &Path) -> Result<File, BakeError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BakeError::write_failed(path, e))?;
    }
    File::create(path).map_err(|e| BakeError::write_failed(path, e))
}

/// Writes `bytes` through `writer`. On failure the file at `path` is removed.
fn write_artifact<W: Write>(mut writer: W, path: &Path, bytes: &[u8]) -> Result<(), BakeError> {
    if let Err(e) = writer.write_all(bytes).and_then(|_| writer.flush()) {
        drop(writer);
        discard_artifact(path);
        return Err(BakeError::write_failed(path, e));
    }
    Ok(())
}

fn discard_artifact(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        log::warn!("Failed to remove partial {}: {}", path.display(), e);
    }
}
