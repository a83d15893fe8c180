//! Decoding a video into numbered frame images.

use std::path::Path;
use tracing::info;

use reveal_models::FramePattern;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::frame_index::FrameIndexer;
use crate::matcher::FrameSequence;

/// Build the extraction command writing `frame-0.<ext>`, `frame-1.<ext>`, ...
pub fn split_command(video: &Path, out_dir: &Path, ext: &str) -> FfmpegCommand {
    FfmpegCommand::new(video, out_dir.join(FramePattern::Original.template(ext))).start_number(0)
}

/// Decode `video` into `out_dir`, numbering frames from 0.
///
/// `out_dir` is created if needed. Returns the number of frames written.
pub async fn split_video(
    runner: &FfmpegRunner,
    video: &Path,
    out_dir: &Path,
    ext: &str,
) -> MediaResult<usize> {
    if !video.exists() {
        return Err(MediaError::FileNotFound(video.to_path_buf()));
    }
    tokio::fs::create_dir_all(out_dir).await?;

    info!(video = %video.display(), dir = %out_dir.display(), "Splitting video into frames");
    runner.run(&split_command(video, out_dir, ext)).await?;

    let prefix = FramePattern::Original.prefix();
    let frames = FrameSequence::scan(out_dir, &FrameIndexer::new(prefix)?)?;
    if frames.is_empty() {
        return Err(MediaError::empty_sequence(prefix, out_dir));
    }
    Ok(frames.len())
}
