//! Comparison-video pipeline binary.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use reveal_models::{Checkpoint, SourceFrameRate};
use reveal_worker::{init_tracing, ExternalToolchain, Orchestrator, PipelineConfig, PipelineRun, VideoSource};

#[derive(Parser, Debug)]
#[command(name = "reveal")]
#[command(about = "Turn source videos into blended and stacked comparison videos")]
struct Cli {
    /// JSON config file (environment variables and flags override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the source videos
    #[arg(long)]
    video_dir: Option<PathBuf>,

    /// Output directory prefix
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Label file listing the videos to process
    #[arg(long)]
    label_file: Option<PathBuf>,

    /// Experiment name of the translation model
    #[arg(short = 'n', long)]
    experiment: Option<String>,

    /// Checkpoint: "latest", an epoch ("14", "e14") or an iteration ("i130000")
    #[arg(long)]
    checkpoint: Option<Checkpoint>,

    #[arg(long)]
    gpu_ids: Option<String>,

    /// Overlay class activation maps
    #[arg(long)]
    cam: bool,

    /// Overlay the time-of-day label only
    #[arg(long)]
    timeofday_classify: bool,

    /// Blend the classifier's second-label overlay
    #[arg(long)]
    second_label: bool,

    /// Frame rate of non-blended videos, or "auto" to probe the source
    #[arg(long)]
    source_fps: Option<SourceFrameRate>,

    /// Frame rate of blended videos
    #[arg(long)]
    blended_fps: Option<f64>,

    /// Frames per reveal cycle
    #[arg(long)]
    fpc: Option<u64>,

    /// Width fraction of the soft edge between the two frames
    #[arg(long)]
    transition: Option<f64>,

    /// Kill external processes running longer than this many seconds
    #[arg(long)]
    stage_timeout: Option<u64>,

    /// Keep working directories of successful runs
    #[arg(long)]
    keep_work_dir: bool,

    /// Write a JSON summary of the batch here
    #[arg(long)]
    report: Option<PathBuf>,

    /// List the videos and the files they would produce, then exit
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn load_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        config.apply_env()?;

        if let Some(v) = &self.video_dir {
            config.video_dir = v.clone();
        }
        if let Some(v) = &self.out_dir {
            config.out_dir = v.clone();
        }
        if let Some(v) = &self.label_file {
            config.label_file = Some(v.clone());
        }
        if let Some(v) = &self.experiment {
            config.experiment = v.clone();
        }
        if let Some(v) = self.checkpoint {
            config.checkpoint = v;
        }
        if let Some(v) = &self.gpu_ids {
            config.gpu_ids = v.clone();
        }
        config.cam |= self.cam;
        config.timeofday_classify |= self.timeofday_classify;
        config.use_second_label |= self.second_label;
        if let Some(v) = self.source_fps {
            config.frame_rates.source = v;
        }
        if let Some(v) = self.blended_fps {
            config.frame_rates.blended = v;
        }
        if let Some(v) = self.fpc {
            config.frames_per_cycle = v;
        }
        if let Some(v) = self.transition {
            config.transition_fraction = v;
        }
        if let Some(v) = self.stage_timeout {
            config.stage_timeout_secs = Some(v);
        }
        config.keep_work_dir |= self.keep_work_dir;

        config.validate()?;
        config.resolve_paths()?;
        Ok(config)
    }
}

fn print_plan(config: &PipelineConfig, sources: &[PathBuf]) {
    for source in sources {
        let run = PipelineRun::new(source, config);
        println!("{}", source.display());
        println!("  work dir: {}", run.work_dir().display());
        for artifact in run.planned_artifacts(config.classify_enabled()) {
            println!("  -> {}", artifact.display());
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing("reveal=info");

    info!("Starting reveal");

    let config = cli.load_config().context("Invalid configuration")?;
    info!("Pipeline config: {:?}", config);

    let sources = VideoSource::from_config(&config)
        .list()
        .context("Failed to list source videos")?;
    if sources.is_empty() {
        warn!("No source videos found, nothing to do");
        return Ok(ExitCode::SUCCESS);
    }

    if cli.dry_run {
        print_plan(&config, &sources);
        return Ok(ExitCode::SUCCESS);
    }

    let toolchain = ExternalToolchain::new(&config);
    toolchain.check().context("Required tools are missing")?;
    let orchestrator = Orchestrator::new(config, toolchain)?;

    let report = orchestrator.run_batch(&sources).await;

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&report.summaries())?;
        std::fs::write(path, json).with_context(|| format!("Failed to write report {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    if report.all_done() {
        info!("All {} videos done", report.succeeded());
        Ok(ExitCode::SUCCESS)
    } else {
        for run in report.runs().iter().filter(|r| !r.is_done()) {
            error!(
                video = %run.source().display(),
                state = %run.state(),
                "{}",
                run.error().map(|e| e.to_string()).unwrap_or_default()
            );
        }
        error!("{} of {} videos failed", report.failed(), report.runs().len());
        Ok(ExitCode::FAILURE)
    }
}
