//! Listing the source videos of a batch.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};

/// Where the videos of a batch come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// Every file in `dir` whose name contains `extension`
    Folder { dir: PathBuf, extension: String },
    /// Videos listed in a label file, restricted to one time of day
    LabelFile {
        path: PathBuf,
        video_dir: PathBuf,
        timeofday: String,
    },
}

#[derive(Debug, Deserialize)]
struct LabelRecord {
    name: String,
    #[serde(default)]
    attributes: LabelAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct LabelAttributes {
    #[serde(default)]
    timeofday: Option<String>,
}

impl VideoSource {
    /// Label file when one is configured, the video directory otherwise.
    pub fn from_config(config: &PipelineConfig) -> Self {
        match &config.label_file {
            Some(path) => VideoSource::LabelFile {
                path: path.clone(),
                video_dir: config.video_dir.clone(),
                timeofday: config.label_timeofday.clone(),
            },
            None => VideoSource::Folder {
                dir: config.video_dir.clone(),
                extension: config.video_extension.clone(),
            },
        }
    }

    /// Paths of the videos to process, in processing order.
    pub fn list(&self) -> WorkerResult<Vec<PathBuf>> {
        let videos = match self {
            VideoSource::Folder { dir, extension } => list_folder(dir, extension)?,
            VideoSource::LabelFile {
                path,
                video_dir,
                timeofday,
            } => list_label_file(path, video_dir, timeofday)?,
        };
        info!(count = videos.len(), "Found source videos");
        Ok(videos)
    }
}

fn list_folder(dir: &Path, extension: &str) -> WorkerResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| WorkerError::source_error(format!("cannot read {}: {}", dir.display(), e)))?;

    let mut videos = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.contains(extension));
        if matches {
            videos.push(path);
        }
    }
    videos.sort();
    Ok(videos)
}

fn list_label_file(path: &Path, video_dir: &Path, timeofday: &str) -> WorkerResult<Vec<PathBuf>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| WorkerError::source_error(format!("cannot read {}: {}", path.display(), e)))?;
    let records: Vec<LabelRecord> = serde_json::from_str(&raw)
        .map_err(|e| WorkerError::source_error(format!("invalid label file {}: {}", path.display(), e)))?;

    let total = records.len();
    let videos: Vec<PathBuf> = records
        .into_iter()
        .filter(|r| r.attributes.timeofday.as_deref() == Some(timeofday))
        .map(|r| video_dir.join(r.name))
        .collect();
    debug!(total, selected = videos.len(), timeofday, "Filtered label file");
    Ok(videos)
}
