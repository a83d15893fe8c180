//! Per-video pipeline runs and the batch driver.
//!
//! A run walks `Split → Transform → [Classify] → Blend → [BlendClassified] →
//! Mux → Cleanup` strictly in order. The first failing stage moves the run
//! to `Failed(stage)` and leaves its working directory in place; the batch
//! moves on to the next video.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, Instrument};

use reveal_media::{
    blend_directory, BlendOptions, BlendReport, FrameIndexer, FrameSequence, MediaError, StackOrientation,
};
use reveal_models::{
    Direction, FramePattern, OutStyle, PipelineStage, RunState, SourceFrameRate, VideoArtifact,
};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::RunLogger;
use crate::toolchain::Toolchain;

/// Lifecycle of one source video.
#[derive(Debug)]
pub struct PipelineRun {
    source: PathBuf,
    basename: String,
    work_dir: PathBuf,
    output_dir: PathBuf,
    state: RunState,
    artifacts: Vec<PathBuf>,
    error: Option<WorkerError>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(source: &Path, config: &PipelineConfig) -> Self {
        let basename = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            source: source.to_path_buf(),
            work_dir: config.work_dir_for(&basename),
            output_dir: config.output_dir(),
            basename,
            state: RunState::Init,
            artifacts: Vec::new(),
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Source file name without extension.
    pub fn basename(&self) -> &str {
        &self.basename
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Videos written so far.
    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    pub fn error(&self) -> Option<&WorkerError> {
        self.error.as_ref()
    }

    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }

    /// Output path of one artifact.
    pub fn artifact_path(&self, artifact: VideoArtifact) -> PathBuf {
        self.output_dir.join(artifact.file_name(&self.basename))
    }

    /// Every video a successful run writes.
    pub fn planned_artifacts(&self, classify: bool) -> Vec<PathBuf> {
        let mut artifacts: Vec<VideoArtifact> = VideoArtifact::BASE.to_vec();
        if classify {
            artifacts.extend_from_slice(VideoArtifact::CLASSIFIED);
        }
        artifacts.into_iter().map(|a| self.artifact_path(a)).collect()
    }

    /// Wall-clock duration of a finished run in seconds.
    pub fn duration_secs(&self) -> Option<f64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            video: self.source.clone(),
            state: self.state,
            work_dir: self.work_dir.clone(),
            artifacts: self.artifacts.clone(),
            error: self.error.as_ref().map(|e| e.to_string()),
            exit_code: self.error.as_ref().and_then(|e| e.exit_code()),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    fn fail(&mut self, stage: PipelineStage, err: WorkerError) {
        self.state = RunState::Failed(stage);
        self.error = Some(err);
        self.finished_at = Some(Utc::now());
    }

    fn finish(&mut self) {
        self.state = RunState::Done;
        self.finished_at = Some(Utc::now());
    }
}

/// Serializable outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub video: PathBuf,
    pub state: RunState,
    pub work_dir: PathBuf,
    pub artifacts: Vec<PathBuf>,
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Outcome of a batch, one run per source video in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    runs: Vec<PipelineRun>,
}

impl BatchReport {
    pub fn runs(&self) -> &[PipelineRun] {
        &self.runs
    }

    pub fn succeeded(&self) -> usize {
        self.runs.iter().filter(|r| r.is_done()).count()
    }

    pub fn failed(&self) -> usize {
        self.runs.len() - self.succeeded()
    }

    /// Whether every video reached `Done`.
    pub fn all_done(&self) -> bool {
        self.runs.iter().all(PipelineRun::is_done)
    }

    pub fn summaries(&self) -> Vec<RunSummary> {
        self.runs.iter().map(PipelineRun::summary).collect()
    }
}

/// Prefix of the frames the inference tool writes in frames style.
fn translated_prefix(direction: Direction) -> WorkerResult<String> {
    let probe = format!("{}0", FramePattern::Original.prefix());
    let name = OutStyle::Frames
        .output_name(direction.translated_visual(), &probe, "", "")?
        .ok_or_else(|| WorkerError::internal("frames style writes no translated frames"))?;
    name.strip_suffix('0')
        .map(str::to_string)
        .ok_or_else(|| WorkerError::internal(format!("unexpected translated frame name '{}'", name)))
}

fn count_frames(dir: &Path, prefix: &str) -> WorkerResult<usize> {
    Ok(FrameSequence::scan(dir, &FrameIndexer::new(prefix)?)?.len())
}

/// Drives pipeline runs over a [`Toolchain`].
pub struct Orchestrator<T: Toolchain> {
    config: PipelineConfig,
    toolchain: T,
}

impl<T: Toolchain> Orchestrator<T> {
    /// Create an orchestrator, rejecting an invalid configuration.
    ///
    /// Data directories are made absolute first.
    pub fn new(mut config: PipelineConfig, toolchain: T) -> WorkerResult<Self> {
        config.validate()?;
        config.resolve_paths()?;
        Ok(Self { config, toolchain })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    /// Run every video in order. A failing video never stops the batch.
    pub async fn run_batch(&self, sources: &[PathBuf]) -> BatchReport {
        let total = sources.len();
        let mut report = BatchReport::default();

        for (index, source) in sources.iter().enumerate() {
            info!("Processing video {} of {}: {}", index + 1, total, source.display());
            report.runs.push(self.run_video(source).await);
        }

        info!(
            total,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Batch finished"
        );
        report
    }

    /// Run one video through every stage.
    pub async fn run_video(&self, source: &Path) -> PipelineRun {
        let mut run = PipelineRun::new(source, &self.config);
        let video = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| source.display().to_string());
        let logger = RunLogger::new(&video, &self.config.run_tag());
        let span = logger.create_span();

        self.drive(&mut run, &logger).instrument(span).await;
        run
    }

    async fn drive(&self, run: &mut PipelineRun, logger: &RunLogger) {
        run.started_at = Some(Utc::now());
        logger.log_start(&run.source.display().to_string());

        for stage in PipelineStage::sequence(self.config.classify_enabled()) {
            run.state = RunState::Running(stage);
            logger.log_stage(stage);

            if let Err(err) = self.run_stage(run, stage, logger).await {
                let err = WorkerError::stage_failed(&run.source, stage, err);
                logger.log_error(stage, &err.to_string());
                if let Some(stderr) = err.stderr() {
                    logger.log_error(stage, &format!("stderr tail:\n{}", stderr));
                }
                if run.work_dir.exists() {
                    logger.log_warning(&format!("Working directory kept at {}", run.work_dir.display()));
                }
                run.fail(stage, err);
                return;
            }
        }

        run.finish();
        logger.log_completion(&format!(
            "{} videos in {} ({:.1}s)",
            run.artifacts.len(),
            run.output_dir.display(),
            run.duration_secs().unwrap_or_default()
        ));
    }

    async fn run_stage(&self, run: &mut PipelineRun, stage: PipelineStage, logger: &RunLogger) -> WorkerResult<()> {
        match stage {
            PipelineStage::Split => self.split(run, logger).await,
            PipelineStage::Transform => self.transform(run, logger).await,
            PipelineStage::Classify => self.classify(run).await,
            PipelineStage::Blend => {
                let report = self
                    .blend(run, stage, FramePattern::Original, FramePattern::Transformed)
                    .await?;
                logger.log_progress(stage, &format!("{} frames blended", report.written));
                Ok(())
            }
            PipelineStage::BlendClassified => {
                let report = self
                    .blend(
                        run,
                        stage,
                        FramePattern::ClassifiedOriginal,
                        self.config.classified_blend_pattern(),
                    )
                    .await?;
                logger.log_progress(stage, &format!("{} classified frames blended", report.written));
                Ok(())
            }
            PipelineStage::Mux => self.mux(run, logger).await,
            PipelineStage::Cleanup => self.cleanup(run, logger).await,
        }
    }

    async fn split(&self, run: &mut PipelineRun, logger: &RunLogger) -> WorkerResult<()> {
        if !run.source.is_file() {
            return Err(MediaError::FileNotFound(run.source.clone()).into());
        }
        if run.work_dir.exists() {
            logger.log_warning(&format!(
                "Removing stale working directory {}",
                run.work_dir.display()
            ));
            tokio::fs::remove_dir_all(&run.work_dir).await?;
        }
        tokio::fs::create_dir_all(&run.work_dir).await?;

        let frames = self.toolchain.split(&run.source, &run.work_dir).await?;
        logger.log_progress(PipelineStage::Split, &format!("{} frames extracted", frames));
        Ok(())
    }

    async fn transform(&self, run: &mut PipelineRun, logger: &RunLogger) -> WorkerResult<()> {
        self.toolchain.transform(&run.work_dir).await?;

        let prefix = translated_prefix(Direction::AtoB)?;
        let frames = count_frames(&run.work_dir, &prefix)?;
        if frames == 0 {
            return Err(WorkerError::MissingOutput {
                stage: PipelineStage::Transform,
                detail: format!("no '{}' frames in {}", prefix, run.work_dir.display()),
            });
        }
        logger.log_progress(PipelineStage::Transform, &format!("{} frames transformed", frames));
        Ok(())
    }

    async fn classify(&self, run: &mut PipelineRun) -> WorkerResult<()> {
        let translated_suffix = Direction::AtoB
            .translated_visual()
            .frame_tag()
            .unwrap_or_default();

        for mode in self.config.classifier_modes() {
            self.toolchain
                .classify(&run.work_dir, mode, translated_suffix)
                .await?;
            self.toolchain.classify(&run.work_dir, mode, "").await?;
        }
        Ok(())
    }

    async fn blend(
        &self,
        run: &mut PipelineRun,
        stage: PipelineStage,
        first: FramePattern,
        second: FramePattern,
    ) -> WorkerResult<BlendReport> {
        // the blended set is named after the first set's prefix
        let options = BlendOptions::crossfade(
            first.prefix(),
            second.prefix(),
            first.prefix(),
            self.config.frames_per_cycle,
        )
        .with_transition_fraction(self.config.transition_fraction)
        .with_aspect_ratio(self.config.aspect_ratio);

        let dir = run.work_dir.clone();
        let report = tokio::task::spawn_blocking(move || blend_directory(&dir, &options))
            .await
            .map_err(|e| WorkerError::internal(format!("blend task failed: {}", e)))??;

        if report.pairs == 0 {
            return Err(WorkerError::MissingOutput {
                stage,
                detail: format!("no common frame ids between '{}' and '{}'", first, second),
            });
        }
        Ok(report)
    }

    async fn mux(&self, run: &mut PipelineRun, logger: &RunLogger) -> WorkerResult<()> {
        tokio::fs::create_dir_all(&run.output_dir).await?;

        let probed = match self.config.frame_rates.source {
            SourceFrameRate::Auto => match self.toolchain.probe_frame_rate(&run.source).await {
                Ok(fps) => fps,
                Err(e) => {
                    logger.log_warning(&format!("Frame rate probe failed, using default: {}", e));
                    None
                }
            },
            SourceFrameRate::Fixed(_) => None,
        };
        let source_fps = self.config.frame_rates.resolve_source(probed);
        let classify = self.config.classify_enabled();

        let mut encoded = vec![VideoArtifact::Blended];
        if classify {
            encoded.push(VideoArtifact::ClassifiedBlended);
        }
        encoded.push(VideoArtifact::Transformed);
        if classify {
            encoded.extend([VideoArtifact::ClassifiedOriginal, VideoArtifact::ClassifiedTransformed]);
        }

        for artifact in encoded {
            let Some(pattern) = artifact.source_pattern() else {
                continue;
            };
            let fps = self.config.frame_rates.rate_for(pattern, source_fps);
            let output = run.artifact_path(artifact);
            let frames = self.toolchain.encode(&run.work_dir, pattern, fps, &output).await?;
            logger.log_progress(
                PipelineStage::Mux,
                &format!("{} ({} frames at {} fps)", output.display(), frames, fps),
            );
            run.artifacts.push(output);
        }

        let transformed = run.artifact_path(VideoArtifact::Transformed);
        let mut stacks = vec![
            (VideoArtifact::VStack, run.source.clone(), transformed.clone(), StackOrientation::Vertical),
            (VideoArtifact::HStack, run.source.clone(), transformed, StackOrientation::Horizontal),
        ];
        if classify {
            let original = run.artifact_path(VideoArtifact::ClassifiedOriginal);
            let transformed = run.artifact_path(VideoArtifact::ClassifiedTransformed);
            stacks.push((
                VideoArtifact::ClassifiedHStack,
                original.clone(),
                transformed.clone(),
                StackOrientation::Horizontal,
            ));
            stacks.push((
                VideoArtifact::ClassifiedVStack,
                original,
                transformed,
                StackOrientation::Vertical,
            ));
        }

        for (artifact, first, second, orientation) in stacks {
            let output = run.artifact_path(artifact);
            self.toolchain
                .stack(&first, &second, orientation, source_fps, &output)
                .await?;
            run.artifacts.push(output);
        }
        Ok(())
    }

    async fn cleanup(&self, run: &mut PipelineRun, logger: &RunLogger) -> WorkerResult<()> {
        if self.config.keep_work_dir {
            logger.log_progress(
                PipelineStage::Cleanup,
                &format!("Keeping working directory {}", run.work_dir.display()),
            );
            return Ok(());
        }
        tokio::fs::remove_dir_all(&run.work_dir).await?;
        Ok(())
    }
}
