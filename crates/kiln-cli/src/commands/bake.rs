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

use crate::commands::bake_config::{load_manifest, BakeManifest, MANIFEST_FILE};
use crate::helpers::*;
use anyhow::{Context, Result};
use clap::Args;
use kiln_agents::BakeAgent;
use kiln_core::bake::{AssetReference, BakeDirectories, BakeRequest, IngestOptions};
use std::path::PathBuf;
use std::time::Instant;

/// Arguments of `kiln bake`.
#[derive(Args, Debug, Default)]
pub struct BakeArgs {
    /// Local paths or http(s) URLs of the meshes to bake. Falls back to the
    /// manifest's `inputs` when empty.
    pub inputs: Vec<String>,

    /// Manifest file to read defaults from
    #[arg(short, long, default_value = MANIFEST_FILE)]
    pub config: PathBuf,

    /// Directory receiving baked artifacts and textures
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Directory receiving working copies of the inputs
    #[arg(short, long)]
    pub working_dir: Option<PathBuf>,

    /// Directory receiving unmodified copies of the inputs
    #[arg(long)]
    pub original_dir: Option<PathBuf>,

    /// Keep polygons as authored instead of triangulating them
    #[arg(long)]
    pub no_triangulate: bool,
}

/// The effective settings of one `kiln bake` invocation.
#[derive(Debug, PartialEq)]
pub struct BakeSettings {
    pub inputs: Vec<String>,
    pub directories: BakeDirectories,
    pub ingest: IngestOptions,
}

/// Merges command-line flags over the manifest. Duplicate inputs are dropped.
pub fn resolve_settings(args: BakeArgs, manifest: BakeManifest) -> BakeSettings {
    let requested = if args.inputs.is_empty() {
        manifest.inputs
    } else {
        args.inputs
    };
    let mut inputs: Vec<String> = Vec::with_capacity(requested.len());
    for input in requested {
        if !inputs.contains(&input) {
            inputs.push(input);
        }
    }

    BakeSettings {
        inputs,
        directories: BakeDirectories {
            working: args.working_dir.unwrap_or(manifest.working_directory),
            output: args.output_dir.unwrap_or(manifest.output_directory),
            original_mirror: args.original_dir.or(manifest.original_directory),
        },
        ingest: IngestOptions {
            triangulate: manifest.triangulate && !args.no_triangulate,
        },
    }
}

pub async fn run(args: BakeArgs) -> Result<()> {
    print_task_start("Baking Assets", FIRE, MAGENTA);
    let start_time = Instant::now();

    let manifest = load_manifest(&args.config)?;
    let settings = resolve_settings(args, manifest);
    if settings.inputs.is_empty() {
        print_error("No inputs given and none listed in the manifest. Nothing to bake.");
        anyhow::bail!("nothing to bake");
    }

    println!(
        "{}🔎 Found:{} {} input(s) to bake into '{}'.",
        BOLD,
        RESET,
        settings.inputs.len(),
        settings.directories.output.display()
    );

    let agent = BakeAgent::with_defaults().context("Failed to set up the bake agent")?;
    let handles: Vec<_> = settings
        .inputs
        .iter()
        .map(|input| {
            let mut request = BakeRequest::new(
                AssetReference::parse(input),
                settings.directories.clone(),
            );
            request.ingest = settings.ingest.clone();
            agent.spawn(request)
        })
        .collect();

    let mut failed = 0;
    for handle in handles {
        let report = handle.wait().await?;
        if report.is_success() {
            for output in &report.output_files {
                print_success(&format!("{} -> {}", report.reference, output.display()));
            }
        } else {
            failed += 1;
            for error in &report.errors {
                print_error(&format!("{}: {}", report.reference, error));
            }
        }
    }

    let total = settings.inputs.len();
    if failed > 0 {
        anyhow::bail!("{} of {} bake(s) failed", failed, total);
    }
    print_success(&format!(
        "Baked {} asset(s) in {:.2}s",
        total,
        start_time.elapsed().as_secs_f64()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_manifest() {
        let manifest = BakeManifest {
            inputs: vec!["from_manifest.obj".into()],
            original_directory: Some("orig".into()),
            ..Default::default()
        };
        let args = BakeArgs {
            inputs: vec!["a.obj".into(), "b.obj".into(), "a.obj".into()],
            output_dir: Some("custom_out".into()),
            no_triangulate: true,
            ..Default::default()
        };

        let settings = resolve_settings(args, manifest);
        assert_eq!(settings.inputs, vec!["a.obj".to_string(), "b.obj".to_string()]);
        assert_eq!(settings.directories.output, PathBuf::from("custom_out"));
        assert_eq!(settings.directories.working, PathBuf::from(".bake/work"));
        assert_eq!(settings.directories.original_mirror, Some(PathBuf::from("orig")));
        assert!(!settings.ingest.triangulate);
    }

    #[test]
    fn manifest_inputs_are_used_when_none_given() {
        let manifest = BakeManifest {
            inputs: vec!["ship.obj".into()],
            ..Default::default()
        };
        let settings = resolve_settings(BakeArgs::default(), manifest);
        assert_eq!(settings.inputs, vec!["ship.obj".to_string()]);
        assert!(settings.ingest.triangulate);
    }
}
