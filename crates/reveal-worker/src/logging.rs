//! Structured run logging utilities.
//!
//! Provides consistent, structured logging for pipeline runs with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reveal_models::PipelineStage;

/// Initialize tracing: colored text by default, JSON when `LOG_FORMAT=json`.
///
/// `default_directive` applies on top of `RUST_LOG`.
pub fn init_tracing(default_directive: &str) {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = default_directive.parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Logger for one video's pipeline run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    video: String,
    run_tag: String,
}

impl RunLogger {
    /// Create a logger for a video name and the batch's run tag
    /// (experiment plus checkpoint).
    pub fn new(video: &str, run_tag: &str) -> Self {
        Self {
            video: video.to_string(),
            run_tag: run_tag.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            video = %self.video,
            run = %self.run_tag,
            "Run started: {}", message
        );
    }

    /// Log entry into a stage.
    pub fn log_stage(&self, stage: PipelineStage) {
        info!(
            video = %self.video,
            run = %self.run_tag,
            stage = %stage,
            "Entering stage {}", stage
        );
    }

    pub fn log_progress(&self, stage: PipelineStage, message: &str) {
        info!(
            video = %self.video,
            run = %self.run_tag,
            stage = %stage,
            "Run progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            video = %self.video,
            run = %self.run_tag,
            "Run warning: {}", message
        );
    }

    pub fn log_error(&self, stage: PipelineStage, message: &str) {
        error!(
            video = %self.video,
            run = %self.run_tag,
            stage = %stage,
            "Run failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            video = %self.video,
            run = %self.run_tag,
            "Run completed: {}", message
        );
    }

    pub fn video(&self) -> &str {
        &self.video
    }

    pub fn run_tag(&self) -> &str {
        &self.run_tag
    }

    /// Create a tracing span for this run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            video = %self.video,
            run = %self.run_tag
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger_creation() {
        let logger = RunLogger::new("clip.mov", "_cgan_e14");
        assert_eq!(logger.video(), "clip.mov");
        assert_eq!(logger.run_tag(), "_cgan_e14");
    }

    #[test]
    fn test_logging_without_subscriber() {
        let logger = RunLogger::new("clip.mov", "_cgan_e14");
        let _guard = logger.create_span().entered();
        logger.log_stage(PipelineStage::Blend);
        logger.log_error(PipelineStage::Mux, "encoder failed");
    }
}
