//! Encoding frame sequences into videos and stacking finished videos.

use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use reveal_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::frame_index::FrameIndexer;
use crate::matcher::FrameSequence;

/// Encode every `<prefix><n>.<ext>` frame in `dir` into `output` at `fps`.
///
/// The sequence is read from its lowest frame id. Returns the number of
/// frames found; fails with [`MediaError::EmptySequence`] when there are none
/// and with [`MediaError::FrameGap`] when the ids are not contiguous, since
/// the image2 demuxer stops at the first missing number.
pub async fn encode_frames(
    runner: &FfmpegRunner,
    dir: &Path,
    prefix: &str,
    ext: &str,
    fps: f64,
    output: &Path,
    encoding: &EncodingConfig,
) -> MediaResult<usize> {
    if !(fps.is_finite() && fps > 0.0) {
        return Err(MediaError::invalid_parameter(format!("frame rate {} must be positive", fps)));
    }

    let sequence = FrameSequence::scan(dir, &FrameIndexer::new(prefix)?)?;
    let first_id = sequence
        .frame_ids()
        .next()
        .ok_or_else(|| MediaError::empty_sequence(prefix, dir))?;
    if let Some(missing) = sequence.first_gap() {
        return Err(MediaError::FrameGap {
            pattern: prefix.to_string(),
            dir: dir.to_path_buf(),
            missing,
        });
    }
    let total = sequence.len();

    let template = dir.join(format!("{}%d.{}", prefix, ext.trim_start_matches('.')));
    let cmd = FfmpegCommand::new(&template, output)
        .input_frame_rate(fps)
        .image_sequence()
        .input_arg("-start_number")
        .input_arg(first_id.to_string())
        .output_args(encoding.to_ffmpeg_args());

    info!(
        frames = total,
        fps,
        output = %output.display(),
        "Encoding '{}' frames",
        prefix
    );
    runner
        .run_with_progress(&cmd, move |progress| {
            debug!(
                frame = progress.frame,
                percent = progress.frame_percentage(total as u64),
                "Encoding progress"
            );
        })
        .await?;
    Ok(total)
}

/// Layout of two stacked videos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOrientation {
    /// Side by side
    Horizontal,
    /// One above the other
    Vertical,
}

impl StackOrientation {
    pub fn filter(&self) -> &'static str {
        match self {
            StackOrientation::Horizontal => "hstack=inputs=2",
            StackOrientation::Vertical => "vstack=inputs=2",
        }
    }
}

impl fmt::Display for StackOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackOrientation::Horizontal => write!(f, "hstack"),
            StackOrientation::Vertical => write!(f, "vstack"),
        }
    }
}

fn stack_command(
    first: &Path,
    second: &Path,
    orientation: StackOrientation,
    fps: f64,
    output: &Path,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    FfmpegCommand::new(first, output)
        .input_frame_rate(fps)
        .add_input(second)
        .filter_complex(orientation.filter())
        .output_args(encoding.to_ffmpeg_args())
}

/// Stack two existing videos into `output`.
pub async fn stack_videos(
    runner: &FfmpegRunner,
    first: &Path,
    second: &Path,
    orientation: StackOrientation,
    fps: f64,
    output: &Path,
    encoding: &EncodingConfig,
) -> MediaResult<()> {
    for input in [first, second] {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }
    }

    info!(
        first = %first.display(),
        second = %second.display(),
        output = %output.display(),
        "Stacking videos ({})",
        orientation
    );
    runner
        .run(&stack_command(first, second, orientation, fps, output, encoding))
        .await
}
