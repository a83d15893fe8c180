//! Worker error types.

use std::path::PathBuf;
use thiserror::Error;

use reveal_media::MediaError;
use reveal_models::{ModelError, PipelineStage};

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Stage {stage} failed for {}: {source}", video.display())]
    StageFailed {
        video: PathBuf,
        stage: PipelineStage,
        #[source]
        source: Box<WorkerError>,
    },

    #[error("{program} failed with {}", describe_exit(.exit_code))]
    ExternalStageFailed {
        program: String,
        exit_code: Option<i32>,
        stderr: Option<String>,
    },

    #[error("{0} not found in PATH")]
    ToolNotFound(String),

    #[error("{program} timed out after {secs} seconds")]
    StageTimeout { program: String, secs: u64 },

    #[error("{stage} produced no output: {detail}")]
    MissingOutput { stage: PipelineStage, detail: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Source listing failed: {0}")]
    SourceError(String),

    #[error("Media error: {0}")]
    Media(MediaError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (killed by signal)".to_string(),
    }
}

/// Failures of the external FFmpeg tools map onto the same variants as the
/// python tools, so callers see one error shape per failing process.
impl From<MediaError> for WorkerError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::FfmpegNotFound => WorkerError::ToolNotFound("ffmpeg".to_string()),
            MediaError::FfprobeNotFound => WorkerError::ToolNotFound("ffprobe".to_string()),
            MediaError::FfmpegFailed { stderr, exit_code, .. } => WorkerError::ExternalStageFailed {
                program: "ffmpeg".to_string(),
                exit_code,
                stderr,
            },
            MediaError::FfprobeFailed { stderr, .. } => WorkerError::ExternalStageFailed {
                program: "ffprobe".to_string(),
                exit_code: None,
                stderr,
            },
            MediaError::Timeout(secs) => WorkerError::StageTimeout {
                program: "ffmpeg".to_string(),
                secs,
            },
            other => WorkerError::Media(other),
        }
    }
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn source_error(msg: impl Into<String>) -> Self {
        Self::SourceError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Attach the video and stage a failure happened in.
    pub fn stage_failed(video: impl Into<PathBuf>, stage: PipelineStage, source: WorkerError) -> Self {
        Self::StageFailed {
            video: video.into(),
            stage,
            source: Box::new(source),
        }
    }

    /// Stage recorded on a [`WorkerError::StageFailed`].
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            WorkerError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Exit code of the failed external process, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            WorkerError::StageFailed { source, .. } => source.exit_code(),
            WorkerError::ExternalStageFailed { exit_code, .. } => *exit_code,
            WorkerError::Media(err) => err.exit_code(),
            _ => None,
        }
    }

    /// Captured stderr tail of the failed external process, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            WorkerError::StageFailed { source, .. } => source.stderr(),
            WorkerError::ExternalStageFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }

    /// Whether the failure came from an external process rather than from
    /// this crate's own processing.
    pub fn is_external(&self) -> bool {
        match self {
            WorkerError::StageFailed { source, .. } => source.is_external(),
            WorkerError::ExternalStageFailed { .. }
            | WorkerError::ToolNotFound(_)
            | WorkerError::StageTimeout { .. } => true,
            _ => false,
        }
    }
}
