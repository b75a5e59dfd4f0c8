//! skinned-export - skinned asset export tool
//!
//! Builds .Skeleton, .SkinnedMesh and .SkinnedAnim files from JSON snapshots of an authoring
//! tool's armature, mesh and sampled animation, and inspects existing files.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use skinned_export::skinned_common::formats::{SKELETON_EXT, SKINNED_ANIM_EXT, SKINNED_MESH_EXT};
use skinned_export::{Config, animation, inspect, mesh, skeleton};

#[derive(Parser)]
#[command(name = "skinned-export")]
#[command(about = "Skinned asset export tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ./skinned.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the negative-forward axis variant (overrides config)
    #[arg(long, global = true)]
    negative_forward: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a summary of a .Skeleton, .SkinnedMesh or .SkinnedAnim file
    Info {
        input: PathBuf,

        /// Skeleton used to name bones
        #[arg(long)]
        skeleton: Option<PathBuf>,
    },

    /// Write the decoded contents of a file as JSON
    Dump {
        input: PathBuf,

        /// Skeleton used to name vertex groups and reconstruct animations
        #[arg(long)]
        skeleton: Option<PathBuf>,

        /// Output JSON file (default: <input>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build a .Skeleton from a hierarchy snapshot
    Skeleton {
        /// Input hierarchy JSON
        input: PathBuf,

        /// Output .Skeleton file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep non-deform bones
        #[arg(long)]
        all_bones: bool,

        /// Skip the Head/Base bone checks
        #[arg(long)]
        no_export_check: bool,

        /// Assign missing or invalid bone ids before building
        #[arg(long)]
        rebuild_ids: bool,
    },

    /// Build a .SkinnedMesh from a mesh snapshot
    Mesh {
        /// Input mesh JSON
        input: PathBuf,

        /// Hierarchy JSON the vertex groups refer to
        #[arg(long)]
        skeleton: PathBuf,

        /// Output .SkinnedMesh file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Bake a .SkinnedAnim from sampled bone offsets
    Animation {
        /// Input samples JSON
        input: PathBuf,

        /// Hierarchy JSON the samples refer to
        #[arg(long)]
        skeleton: PathBuf,

        /// Output .SkinnedAnim file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// First frame to bake (overrides config)
        #[arg(long)]
        first_frame: Option<i32>,

        /// Last frame to bake, inclusive (overrides config)
        #[arg(long)]
        last_frame: Option<i32>,
    },
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if cli.negative_forward {
        config.coordinates.negative_forward = true;
    }
    let import = config.coordinates.import_converter();
    let export = config.coordinates.export_converter();

    match cli.command {
        Commands::Info { input, skeleton } => {
            inspect::info(&input, skeleton.as_deref(), import)?;
        }

        Commands::Dump {
            input,
            skeleton,
            output,
        } => {
            let output = output.unwrap_or_else(|| append_extension(&input, "json"));
            tracing::info!("Dumping {:?} -> {:?}", input, output);
            inspect::dump(&input, skeleton.as_deref(), &output, import)?;
            tracing::info!("Done!");
        }

        Commands::Skeleton {
            input,
            output,
            all_bones,
            no_export_check,
            rebuild_ids,
        } => {
            if all_bones {
                config.skeleton.only_deform_bones = false;
            }
            if no_export_check {
                config.skeleton.check_for_exportation = false;
            }
            if rebuild_ids {
                config.skeleton.rebuild_missing_ids = true;
            }
            let output = output.unwrap_or_else(|| input.with_extension(SKELETON_EXT));
            tracing::info!("Exporting skeleton {:?} -> {:?}", input, output);
            let skeleton = skeleton::export_skeleton(&input, &output, &config.skeleton, export)?;
            tracing::info!("Done! {} bones", skeleton.bone_count());
        }

        Commands::Mesh {
            input,
            skeleton,
            output,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension(SKINNED_MESH_EXT));
            tracing::info!("Exporting mesh {:?} -> {:?}", input, output);
            let mesh = mesh::export_mesh(&input, &skeleton, &output, &config.skeleton, export)?;
            tracing::info!(
                "Done! {} vertices, {} triangles",
                mesh.vertex_count(),
                mesh.triangle_count()
            );
        }

        Commands::Animation {
            input,
            skeleton,
            output,
            first_frame,
            last_frame,
        } => {
            if first_frame.is_some() {
                config.animation.first_frame = first_frame;
            }
            if last_frame.is_some() {
                config.animation.last_frame = last_frame;
            }
            let output = output.unwrap_or_else(|| input.with_extension(SKINNED_ANIM_EXT));
            tracing::info!("Exporting animation {:?} -> {:?}", input, output);
            let animation = animation::export_animation(
                &input,
                &skeleton,
                &output,
                &config.skeleton,
                &config.animation,
                export,
            )?;
            tracing::info!("Done! {} frames", animation.total_frames);
        }
    }

    Ok(())
}
