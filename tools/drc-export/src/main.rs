//! drc-export - scene to .drc geometry export tool
//!
//! Merges every mesh of an OBJ or glTF scene into one triangulated, globally
//! indexed stream and writes it as a .drc container.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use drc_common::{DRC_EXT, DrcMesh};
use std::path::PathBuf;

use drc_export::{
    ContainerEncoder, ExportOutcome, Exporter, Strategy, load_config, merge_scene, open_scene,
};

#[derive(Parser)]
#[command(name = "drc-export")]
#[command(about = "Scene geometry export tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a scene and encode it to a .drc file
    Export {
        /// Input scene file (OBJ/glTF/GLB)
        input: PathBuf,

        /// Output .drc file (an empty path exports nothing)
        #[arg(short, long)]
        output: Option<String>,

        /// Path to drc-export.toml (default: next to the input)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Encoder binding (overrides the config file)
        #[arg(long, value_enum)]
        strategy: Option<Strategy>,
    },

    /// Print the header and counts of a .drc file
    Inspect {
        /// Input .drc file
        file: PathBuf,
    },

    /// Merge a scene without encoding it
    Check {
        /// Input scene file (OBJ/glTF/GLB)
        input: PathBuf,

        /// Path to drc-export.toml (default: next to the input)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            input,
            output,
            config,
            strategy,
        } => {
            if output.as_deref() == Some("") {
                tracing::warn!("Empty output path, skipping {:?}", input);
                tracing::info!("Nothing exported");
                return Ok(());
            }
            let output = output
                .map(PathBuf::from)
                .unwrap_or_else(|| input.with_extension(DRC_EXT));

            let mut config = load_config(config.as_deref(), &input)?;
            if let Some(strategy) = strategy {
                config.export.strategy = strategy;
            }
            tracing::info!("Converting {:?} -> {:?}", input, output);

            let scene = open_scene(&input)?;
            let encoder = ContainerEncoder::new(config.encoding_settings());
            let outcome = Exporter::new(&encoder, &config)
                .export(scene.as_ref(), &output)
                .with_context(|| format!("Failed to export {:?}", input))?;

            match outcome {
                ExportOutcome::Finished(summary) => {
                    tracing::info!(
                        "Exported {} objects: {} vertices, {} faces, {} texcoord channels ({} binding)",
                        summary.object_count,
                        summary.vertex_count,
                        summary.face_count,
                        summary.texcoord_channels,
                        summary.strategy
                    );
                    if summary.skinned {
                        tracing::info!("Joint and weight channels included");
                    }
                    tracing::info!("Done!");
                }
                ExportOutcome::Skipped => tracing::info!("Nothing exported"),
            }
        }

        Commands::Inspect { file } => {
            let data = std::fs::read(&file).with_context(|| format!("Failed to read {:?}", file))?;
            let (header, mesh) = DrcMesh::from_bytes(&data)
                .with_context(|| format!("Failed to decode {:?}", file))?;

            println!("{}", file.display());
            println!("  version:           {}", header.version);
            println!("  vertices:          {}", header.vertex_count);
            println!("  faces:             {}", header.face_count);
            println!("  normals:           {}", header.has_normals());
            println!("  texcoord channels: {}", header.texcoord_channels);
            println!("  joints:            {}", header.has_joints());
            println!("  weights:           {}", header.has_weights());
            println!("  index width:       {} bytes", header.index_width.bytes());
            println!(
                "  compression level: {}",
                header.settings.compression_level
            );
            let q = header.settings.quantization;
            println!(
                "  quantization:      position {}, normal {}, texcoord {}, generic {}",
                q.position, q.normal, q.texcoord, q.generic
            );
            if let Some(max) = mesh.indices.iter().max() {
                println!("  max index:         {}", max);
            }
            if let Some(max) = mesh.joints.iter().flatten().max() {
                println!("  max joint:         {}", max);
            }
        }

        Commands::Check { input, config } => {
            tracing::info!("Checking {:?}", input);
            let config = load_config(config.as_deref(), &input)?;
            let scene = open_scene(&input)?;
            let merged = merge_scene(scene.as_ref(), &config)
                .with_context(|| format!("Failed to merge {:?}", input))?;
            tracing::info!(
                "Scene is valid: {} objects, {} vertices, {} faces, {} texcoord channels",
                merged.object_count,
                merged.vertex_count(),
                merged.faces.len(),
                merged.texcoords.len()
            );
        }
    }

    Ok(())
}
