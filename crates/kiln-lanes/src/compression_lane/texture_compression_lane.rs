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

//! Re-encodes material textures into PNG files next to the baked artifact.

use ahash::AHashMap;
use image::{DynamicImage, ImageFormat};
use kiln_core::bake::{BakeError, TextureCompressor, TextureRequest, TextureUsage};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Suffix inserted before the extension of re-encoded textures.
pub const BAKED_TEXTURE_SUFFIX: &str = ".baked.png";

/// Hex digits of the content hash embedded in baked texture names.
const NAME_HASH_LEN: usize = 16;

/// One memoized texture: the source, where it was written, and how it is sampled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    source: PathBuf,
    output_dir: PathBuf,
    usage: TextureUsage,
}

/// Name of the baked file, filled once the first request for a key has encoded it.
type CacheSlot = Arc<Mutex<Option<String>>>;

/// A texture compressor backed by the `image` crate.
///
/// Albedo maps are stored as RGBA8 and specular maps as single-channel luma.
/// Baked files are named `<stem>-<hash>.baked.png`, where the hash covers the
/// source pixels and the usage, so distinct sources never share a file.
///
/// Results are memoized per source, output directory and usage. Concurrent
/// requests for the same key wait for the first one instead of encoding twice.
/// The usage hint is evaluated only once the source is known to exist.
#[derive(Debug, Default)]
pub struct ImageTextureLane {
    cache: Mutex<AHashMap<CacheKey, CacheSlot>>,
}

impl ImageTextureLane {
    /// Creates a new `ImageTextureLane` with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of textures compressed so far.
    pub fn cached_count(&self) -> usize {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .values()
            .filter(|slot| {
                slot.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_some()
            })
            .count()
    }

    fn slot(&self, key: CacheKey) -> CacheSlot {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cache.entry(key).or_default())
    }

    fn encode(
        &self,
        source: &Path,
        output_dir: &Path,
        usage: TextureUsage,
    ) -> Result<String, BakeError> {
        let subject = source.display().to_string();
        let bytes = std::fs::read(source).map_err(|e| BakeError::compression_failed(&subject, e))?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| BakeError::compression_failed(&subject, e))?;

        let converted = match usage {
            TextureUsage::Albedo => DynamicImage::ImageRgba8(decoded.to_rgba8()),
            TextureUsage::Specular => DynamicImage::ImageLuma8(decoded.to_luma8()),
        };

        let file_name = baked_file_name(source, &bytes, usage);
        let destination = output_dir.join(&file_name);

        std::fs::create_dir_all(output_dir)
            .map_err(|e| BakeError::compression_failed(&subject, e))?;
        converted
            .save_with_format(&destination, ImageFormat::Png)
            .map_err(|e| BakeError::compression_failed(&subject, e))?;

        log::info!(
            "Compressed {:?} texture {} -> {}",
            usage,
            source.display(),
            destination.display()
        );
        Ok(file_name)
    }
}

/// `<stem>-<hash>.baked.png`, hashing the source bytes and the usage.
fn baked_file_name(source: &Path, bytes: &[u8], usage: TextureUsage) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "texture".to_string());

    let mut hasher = blake3::Hasher::new();
    hasher.update(bytes);
    hasher.update(match usage {
        TextureUsage::Albedo => b"albedo".as_slice(),
        TextureUsage::Specular => b"specular".as_slice(),
    });
    let digest = hasher.finalize().to_hex();
    format!("{stem}-{}{BAKED_TEXTURE_SUFFIX}", &digest.as_str()[..NAME_HASH_LEN])
}

impl TextureCompressor for ImageTextureLane {
    fn compress(
        &self,
        request: &TextureRequest<'_>,
        usage: &dyn Fn() -> TextureUsage,
    ) -> Result<String, BakeError> {
        let source = request.source_dir.join(request.filename);
        if !source.is_file() {
            return Err(BakeError::compression_failed(
                source.display().to_string(),
                "texture file not found",
            ));
        }

        let usage = usage();
        let slot = self.slot(CacheKey {
            source: source.clone(),
            output_dir: request.output_dir.to_path_buf(),
            usage,
        });
        // Held while encoding so a concurrent request for the same key waits.
        let mut baked = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = baked.as_ref() {
            log::debug!("Texture {} already compressed", source.display());
            return Ok(hit.clone());
        }

        let file_name = self.encode(&source, request.output_dir, usage)?;
        *baked = Some(file_name.clone());
        Ok(file_name)
    }
}
