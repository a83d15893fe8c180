//! Blend or concatenate two aligned frame sequences inside one directory.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use reveal_media::blender::DEFAULT_FRAMES_PER_CYCLE;
use reveal_media::composite::DEFAULT_TRANSITION_FRACTION;
use reveal_media::{blend_directory, BlendOptions};
use reveal_worker::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "frame-blender")]
#[command(about = "Crossfade or concatenate two frame sequences matched by frame number")]
struct Args {
    /// Directory holding both frame sequences
    #[arg(long)]
    path: PathBuf,

    /// Prefix of the frames shown on the left
    #[arg(long, default_value = "frame-")]
    pattern1: String,

    /// Prefix of the frames revealed from the right
    #[arg(long)]
    pattern2: String,

    /// Frames per reveal cycle
    #[arg(long, default_value_t = DEFAULT_FRAMES_PER_CYCLE)]
    fpc: u64,

    /// Prefix of written frames
    #[arg(long, default_value = "frame-")]
    out_basename: String,

    /// Width fraction of the soft edge between the two frames
    #[arg(long, default_value_t = DEFAULT_TRANSITION_FRACTION)]
    transition: f64,

    /// Stretch written frames to this aspect ratio
    #[arg(long, default_value_t = 1.0)]
    aspect_ratio: f64,

    /// Write crossfaded frames
    #[arg(long)]
    blend: bool,

    /// Write vertically concatenated frames
    #[arg(long)]
    vertcat: bool,

    /// Write horizontally concatenated frames
    #[arg(long)]
    horzcat: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing("reveal=info");

    if !(args.blend || args.vertcat || args.horzcat) {
        bail!("nothing to do: pass at least one of --blend, --vertcat, --horzcat");
    }

    let options = BlendOptions {
        pattern1: args.pattern1,
        pattern2: args.pattern2,
        out_basename: args.out_basename,
        frames_per_cycle: args.fpc,
        transition_fraction: args.transition,
        aspect_ratio: args.aspect_ratio,
        blend: args.blend,
        vertcat: args.vertcat,
        horzcat: args.horzcat,
    };

    let report = blend_directory(&args.path, &options)
        .with_context(|| format!("Blending frames in {} failed", args.path.display()))?;

    info!(
        pairs = report.pairs,
        written = report.written,
        "Done with {}",
        args.path.display()
    );
    Ok(())
}
