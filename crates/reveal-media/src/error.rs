//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during frame and video processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("No frame id after '{pattern}' in '{file_name}'")]
    NoMatch { file_name: String, pattern: String },

    #[error("No frames matching '{pattern}' found in {}", dir.display())]
    EmptySequence { pattern: String, dir: PathBuf },

    #[error("Frame {missing} of '{pattern}' missing in {}", dir.display())]
    FrameGap {
        pattern: String,
        dir: PathBuf,
        missing: u64,
    },

    #[error("Frame size mismatch: {}x{} vs {}x{}", left.0, left.1, right.0, right.1)]
    SizeMismatch { left: (u32, u32), right: (u32, u32) },

    #[error("Concatenation needs at least one image")]
    EmptyInput,

    #[error("Frame {frame_id} ({}): {source}", path.display())]
    Frame {
        frame_id: u64,
        path: PathBuf,
        #[source]
        source: Box<MediaError>,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a no-match error for a file name.
    pub fn no_match(file_name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::NoMatch {
            file_name: file_name.into(),
            pattern: pattern.into(),
        }
    }

    /// Create an empty-sequence error.
    pub fn empty_sequence(pattern: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self::EmptySequence {
            pattern: pattern.into(),
            dir: dir.into(),
        }
    }

    /// Create an invalid parameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Attach the frame a failure happened on.
    pub fn in_frame(self, frame_id: u64, path: impl Into<PathBuf>) -> Self {
        Self::Frame {
            frame_id,
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// Exit code of the failed external process, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            MediaError::FfmpegFailed { exit_code, .. } => *exit_code,
            MediaError::Frame { source, .. } => source.exit_code(),
            _ => None,
        }
    }

    /// Whether this error came from a failing or missing external tool.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            MediaError::FfmpegNotFound
                | MediaError::FfprobeNotFound
                | MediaError::FfmpegFailed { .. }
                | MediaError::FfprobeFailed { .. }
                | MediaError::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_context_keeps_source() {
        let err = MediaError::SizeMismatch {
            left: (4, 2),
            right: (2, 2),
        }
        .in_frame(7, "/tmp/frame-7.png");

        let msg = err.to_string();
        assert!(msg.contains("Frame 7"));
        assert!(msg.contains("4x2 vs 2x2"));
    }

    #[test]
    fn test_exit_code() {
        let err = MediaError::ffmpeg_failed("boom", None, Some(1));
        assert_eq!(err.exit_code(), Some(1));
        assert!(err.is_external());
        assert!(!MediaError::EmptyInput.is_external());
    }
}
