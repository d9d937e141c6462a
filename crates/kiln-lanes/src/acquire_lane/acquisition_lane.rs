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

//! Copies or downloads an input to a deterministic working-copy path.

use super::{HttpFetcher, RemoteFetcher};
use kiln_core::bake::{AssetReference, BakeDirectories, BakeError};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Hex characters of the reference hash kept in working-copy names.
const HASH_LEN: usize = 16;

/// Resolves an [`AssetReference`] to bytes on the local filesystem.
#[derive(Clone)]
pub struct AcquisitionLane {
    fetcher: Arc<dyn RemoteFetcher>,
}

impl AcquisitionLane {
    /// Creates a lane downloading remote references through `fetcher`.
    pub fn new(fetcher: Arc<dyn RemoteFetcher>) -> Self {
        Self { fetcher }
    }

    /// Creates a lane using the default [`HttpFetcher`].
    pub fn with_http() -> anyhow::Result<Self> {
        Ok(Self::new(Arc::new(HttpFetcher::new()?)))
    }

    /// Where `reference` is placed inside `working_dir`.
    ///
    /// The name is `<stem>-<hash>.<ext>`, the hash being derived from the full
    /// reference, so the same reference always lands on the same path.
    pub fn working_copy_path(reference: &AssetReference, working_dir: &Path) -> PathBuf {
        let digest = blake3::hash(reference.to_string().as_bytes()).to_hex();
        let digest = &digest.as_str()[..HASH_LEN];
        let stem = reference.base_name().unwrap_or_else(|| "asset".to_string());
        let file_name = match reference.extension() {
            Some(ext) => format!("{stem}-{digest}.{ext}"),
            None => format!("{stem}-{digest}"),
        };
        working_dir.join(file_name)
    }

    /// Produces the working copy of `reference` and returns its path.
    ///
    /// Local references never suspend; remote ones suspend for the download.
    ///
    /// # Errors
    /// [`BakeError::SourceNotFound`] for a missing local file,
    /// [`BakeError::DownloadFailed`] on transport failure and
    /// [`BakeError::WriteFailed`] if the working copy cannot be written.
    pub async fn acquire(
        &self,
        reference: &AssetReference,
        directories: &BakeDirectories,
    ) -> Result<PathBuf, BakeError> {
        let destination = Self::working_copy_path(reference, &directories.working);
        std::fs::create_dir_all(&directories.working)
            .map_err(|e| BakeError::write_failed(&directories.working, e))?;

        match reference {
            AssetReference::Local(source) => {
                if !source.is_file() {
                    return Err(BakeError::SourceNotFound {
                        reference: reference.to_string(),
                    });
                }
                std::fs::copy(source, &destination)
                    .map_err(|e| BakeError::write_failed(&destination, e))?;
                log::info!(
                    "Copied {} to {}",
                    source.display(),
                    destination.display()
                );
            }
            AssetReference::Remote(url) => {
                let body = self.fetcher.fetch(url).await.map_err(|reason| {
                    BakeError::DownloadFailed {
                        reference: reference.to_string(),
                        reason,
                    }
                })?;
                std::fs::write(&destination, &body)
                    .map_err(|e| BakeError::write_failed(&destination, e))?;
                log::info!(
                    "Downloaded {} ({} bytes) to {}",
                    url,
                    body.len(),
                    destination.display()
                );
            }
        }

        if let Some(mirror) = &directories.original_mirror {
            mirror_original(reference, &destination, mirror);
        }

        Ok(destination)
    }
}

fn mirror_original(reference: &AssetReference, working_copy: &Path, mirror: &Path) {
    let Some(file_name) = reference.file_name() else {
        log::warn!("Cannot mirror {reference}: no file name");
        return;
    };
    let target = mirror.join(file_name);
    let result = std::fs::create_dir_all(mirror).and_then(|_| std::fs::copy(working_copy, &target));
    match result {
        Ok(_) => log::debug!("Mirrored {} to {}", reference, target.display()),
        Err(e) => log::warn!("Failed to mirror {} to {}: {}", reference, target.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct StubFetcher(Result<Vec<u8>, String>);

    #[async_trait]
    impl RemoteFetcher for StubFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, String> {
            self.0.clone()
        }
    }

    fn lane(result: Result<Vec<u8>, String>) -> AcquisitionLane {
        AcquisitionLane::new(Arc::new(StubFetcher(result)))
    }

    fn directories(root: &Path, mirror: bool) -> BakeDirectories {
        BakeDirectories {
            working: root.join("work"),
            output: root.join("out"),
            original_mirror: mirror.then(|| root.join("original")),
        }
    }

    #[test]
    fn working_copy_names_are_stable_and_distinct() {
        let dir = Path::new("/work");
        let a = AssetReference::parse("a/cube.obj");
        let b = AssetReference::parse("b/cube.obj");

        let path_a = AcquisitionLane::working_copy_path(&a, dir);
        assert_eq!(path_a, AcquisitionLane::working_copy_path(&a, dir));
        assert_ne!(path_a, AcquisitionLane::working_copy_path(&b, dir));

        let name = path_a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("cube-"));
        assert!(name.ends_with(".obj"));
        assert_eq!(name.len(), "cube-".len() + HASH_LEN + ".obj".len());
    }

    #[tokio::test]
    async fn local_acquisition_is_idempotent() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("cube.obj");
        std::fs::write(&source, b"v 0 0 0\n").unwrap();
        let reference = AssetReference::Local(source);
        let dirs = directories(dir.path(), true);

        let lane = lane(Err("unused".into()));
        let first = lane.acquire(&reference, &dirs).await.unwrap();
        let first_bytes = std::fs::read(&first).unwrap();
        let second = lane.acquire(&reference, &dirs).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first_bytes, std::fs::read(&second).unwrap());
        assert_eq!(std::fs::read_dir(dir.path().join("work")).unwrap().count(), 1);
        assert!(dir.path().join("original/cube.obj").is_file());
    }

    #[tokio::test]
    async fn missing_local_file_is_not_found() {
        let dir = tempdir().unwrap();
        let reference = AssetReference::Local(dir.path().join("missing.obj"));
        let err = lane(Err("unused".into()))
            .acquire(&reference, &directories(dir.path(), false))
            .await
            .unwrap_err();
        assert!(matches!(err, BakeError::SourceNotFound { .. }));
    }

    #[tokio::test]
    async fn remote_body_is_written() {
        let dir = tempdir().unwrap();
        let reference = AssetReference::parse("https://example.com/models/cube.obj?v=2");
        let path = lane(Ok(b"v 1 2 3\n".to_vec()))
            .acquire(&reference, &directories(dir.path(), true))
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"v 1 2 3\n");
        assert!(dir.path().join("original/cube.obj").is_file());
    }

    #[tokio::test]
    async fn transport_failure_carries_reference() {
        let dir = tempdir().unwrap();
        let url = "https://example.com/cube.obj";
        let err = lane(Err("connection refused".into()))
            .acquire(&AssetReference::parse(url), &directories(dir.path(), false))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BakeError::DownloadFailed {
                reference: url.to_string(),
                reason: "connection refused".to_string(),
            }
        );
    }
}
