// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use samplemap::audio::{envelope_for_file, MetadataProvider, SymphoniaMetadataProvider};
use samplemap::config::{ProjectFile, DEFAULT_SENSITIVITY};
use samplemap::mapping::{GridIssue, MappingEngine};
use samplemap::segment::{segments_from_cuts, transient_cuts, DEFAULT_BLOCK_SIZE};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A multi-sample preset builder."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replays a project file and exports the resulting preset.
    Build {
        /// The path to the project file.
        project_path: String,
    },
    /// Prints the transient cut points detected in an audio file.
    Slice {
        /// The path to the audio file.
        file: String,
        /// Detection sensitivity between 0 and 1. Higher finds more cuts.
        #[arg[short, long]]
        sensitivity: Option<f32>,
        /// Number of frames per envelope block.
        #[arg[short, long]]
        block_size: Option<usize>,
    },
    /// Prints the metadata of an audio file.
    Info {
        /// The path to the audio file.
        file: String,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build { project_path } => {
            let project = ProjectFile::deserialize(&PathBuf::from(&project_path))?;
            let engine = MappingEngine::default();
            let mut warnings = project.apply(&engine)?;

            for (key, _) in engine.configurations() {
                let grid = engine.grid(key)?;
                for issue in grid.issues() {
                    match issue {
                        GridIssue::Overflow { part, layer } => println!(
                            "Key {}: part {} does not fit in layer {}",
                            key, part, layer
                        ),
                        GridIssue::Unmatched { part, velocity_min } => println!(
                            "Key {}: part {} (velocity {}) matches no layer",
                            key, part, velocity_min
                        ),
                    }
                }
            }

            let report = engine.export(&project.exporter(), &project.output_path())?;
            warnings.extend(report.warnings);
            if !warnings.is_empty() {
                println!("Warnings (count: {}):", warnings.len());
                for warning in warnings.iter() {
                    println!("- {}", warning);
                }
            }
            println!(
                "Wrote {} ({} parts, seed {})",
                report.preset.display(),
                report.parts.len(),
                report.seed
            );
        }
        Commands::Slice {
            file,
            sensitivity,
            block_size,
        } => {
            let path = PathBuf::from(&file);
            let sensitivity = sensitivity.unwrap_or(DEFAULT_SENSITIVITY);
            let (envelope, frames) =
                envelope_for_file(&path, block_size.unwrap_or(DEFAULT_BLOCK_SIZE))?;
            let cuts: Vec<f64> = transient_cuts(&envelope, sensitivity).collect();

            if cuts.is_empty() {
                println!("No transients found in {}.", file);
                return Ok(());
            }

            println!("Cuts (count: {}):", cuts.len());
            for cut in cuts.iter() {
                println!("- {:.4}", cut);
            }
            println!("\nSegments:");
            for (index, segment) in segments_from_cuts(&cuts, frames).iter().enumerate() {
                println!(
                    "- {}: frames {}..{} ({} frames)",
                    index + 1,
                    segment.start,
                    segment.end,
                    segment.len()
                );
            }
        }
        Commands::Info { file } => {
            let metadata = SymphoniaMetadataProvider::new().read(&PathBuf::from(&file))?;
            println!("{}:", file);
            println!("- sample rate: {} Hz", metadata.sample_rate);
            println!("- frames: {}", metadata.frame_count);
            println!(
                "- duration: {:.3}s",
                metadata.frame_count as f64 / f64::from(metadata.sample_rate)
            );
            println!("- size: {} bytes", metadata.file_size);
        }
    }

    Ok(())
}
