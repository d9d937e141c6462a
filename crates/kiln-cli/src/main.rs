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

// Command-line front end of the Kiln baking pipeline
// Run with: kiln <command>

mod commands;
mod helpers;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::bake::BakeArgs;
use helpers::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Bake mesh assets into compact binary scene artifacts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bake one or more meshes
    Bake(BakeArgs),
    /// Print the node tree of a baked artifact
    Inspect {
        /// The artifact to decode
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    println!("{}", BANNER);

    let cli = Cli::parse();
    let result: Result<()> = match cli.command {
        Command::Bake(args) => commands::bake::run(args).await,
        Command::Inspect { file } => commands::inspect::run(&file),
    };

    if let Err(e) = result {
        print_error(&format!("Task failed: {:?}", e));
        std::process::exit(1);
    }
}
