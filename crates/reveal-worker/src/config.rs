//! Pipeline configuration.
//!
//! Values are layered, later sources overriding earlier ones: built-in
//! defaults, an optional JSON file, `REVEAL_*` environment variables and
//! finally command-line flags (applied by the binary).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use reveal_models::{Checkpoint, EncodingConfig, FramePattern, FrameRateTable, SourceFrameRate};

use crate::error::{WorkerError, WorkerResult};
use crate::toolchain::ClassifierMode;

/// Configuration of one batch of pipeline runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the source videos; working directories are created here
    pub video_dir: PathBuf,
    /// Output directory prefix, suffixed with the experiment and checkpoint
    pub out_dir: PathBuf,
    /// Label file listing the videos to process instead of scanning `video_dir`
    pub label_file: Option<PathBuf>,
    /// Time-of-day label selected from the label file
    pub label_timeofday: String,
    /// Substring a file name must contain to be picked up from `video_dir`
    pub video_extension: String,

    /// Working directory of the python tools
    pub project_root: PathBuf,
    pub python: String,
    pub inference_script: PathBuf,
    pub classifier_script: PathBuf,
    pub classifier_weights: PathBuf,

    /// Experiment name of the translation model
    pub experiment: String,
    pub checkpoint: Checkpoint,
    pub gpu_ids: String,
    pub load_size: u32,
    pub batch_size: u32,

    /// Overlay class activation maps on the frames
    pub cam: bool,
    /// Overlay the time-of-day class label only
    pub timeofday_classify: bool,
    /// Blend the second-label overlay instead of the first
    pub use_second_label: bool,

    pub frame_rates: FrameRateTable,
    pub frames_per_cycle: u64,
    pub transition_fraction: f64,
    pub aspect_ratio: f64,

    /// Kill any external process running longer than this
    pub stage_timeout_secs: Option<u64>,
    /// Keep working directories after a successful run
    pub keep_work_dir: bool,
    pub encoding: EncodingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            video_dir: PathBuf::from("videos"),
            out_dir: PathBuf::from("videos_converted"),
            label_file: None,
            label_timeofday: "daytime".to_string(),
            video_extension: "mov".to_string(),
            project_root: PathBuf::from("."),
            python: "python3".to_string(),
            inference_script: PathBuf::from("./nightdrive_test.py"),
            classifier_script: PathBuf::from("classifier_timeofday/timeofday_cam.py"),
            classifier_weights: PathBuf::from(
                "classifier_timeofday/models/resnet18_timeofday_daynight_classifier_best.pth",
            ),
            experiment: "cyclegan".to_string(),
            checkpoint: Checkpoint::default(),
            gpu_ids: "0".to_string(),
            load_size: 1280,
            batch_size: 32,
            cam: false,
            timeofday_classify: false,
            use_second_label: false,
            frame_rates: FrameRateTable::default(),
            // ten seconds of blended output per reveal cycle
            frames_per_cycle: 600,
            transition_fraction: reveal_media::composite::DEFAULT_TRANSITION_FRACTION,
            aspect_ratio: 1.0,
            stage_timeout_secs: None,
            keep_work_dir: false,
            encoding: EncodingConfig::default(),
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> WorkerResult<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| WorkerError::config_error(format!("{}={}: {}", key, raw, e))),
        None => Ok(None),
    }
}

fn env_flag(key: &str) -> Option<bool> {
    env_var(key).map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl PipelineConfig {
    /// Load a JSON config file; missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> WorkerResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            WorkerError::config_error(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| WorkerError::config_error(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Defaults overridden by `REVEAL_*` environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `REVEAL_*` environment variables.
    pub fn apply_env(&mut self) -> WorkerResult<()> {
        if let Some(v) = env_var("REVEAL_VIDEO_DIR") {
            self.video_dir = PathBuf::from(v);
        }
        if let Some(v) = env_var("REVEAL_OUT_DIR") {
            self.out_dir = PathBuf::from(v);
        }
        if let Some(v) = env_var("REVEAL_LABEL_FILE") {
            self.label_file = Some(PathBuf::from(v));
        }
        if let Some(v) = env_var("REVEAL_VIDEO_EXTENSION") {
            self.video_extension = v;
        }
        if let Some(v) = env_var("REVEAL_PROJECT_ROOT") {
            self.project_root = PathBuf::from(v);
        }
        if let Some(v) = env_var("REVEAL_PYTHON") {
            self.python = v;
        }
        if let Some(v) = env_var("REVEAL_INFERENCE_SCRIPT") {
            self.inference_script = PathBuf::from(v);
        }
        if let Some(v) = env_var("REVEAL_CLASSIFIER_SCRIPT") {
            self.classifier_script = PathBuf::from(v);
        }
        if let Some(v) = env_var("REVEAL_CLASSIFIER_WEIGHTS") {
            self.classifier_weights = PathBuf::from(v);
        }
        if let Some(v) = env_var("REVEAL_EXPERIMENT") {
            self.experiment = v;
        }
        if let Some(v) = env_parse::<Checkpoint>("REVEAL_CHECKPOINT")? {
            self.checkpoint = v;
        }
        if let Some(v) = env_var("REVEAL_GPU_IDS") {
            self.gpu_ids = v;
        }
        if let Some(v) = env_parse("REVEAL_LOAD_SIZE")? {
            self.load_size = v;
        }
        if let Some(v) = env_parse("REVEAL_BATCH_SIZE")? {
            self.batch_size = v;
        }
        if let Some(v) = env_flag("REVEAL_CAM") {
            self.cam = v;
        }
        if let Some(v) = env_flag("REVEAL_TIMEOFDAY_CLASSIFY") {
            self.timeofday_classify = v;
        }
        if let Some(v) = env_flag("REVEAL_USE_SECOND_LABEL") {
            self.use_second_label = v;
        }
        if let Some(v) = env_parse::<SourceFrameRate>("REVEAL_SOURCE_FPS")? {
            self.frame_rates.source = v;
        }
        if let Some(v) = env_parse("REVEAL_BLENDED_FPS")? {
            self.frame_rates.blended = v;
        }
        if let Some(v) = env_parse("REVEAL_FRAMES_PER_CYCLE")? {
            self.frames_per_cycle = v;
        }
        if let Some(v) = env_parse("REVEAL_TRANSITION_FRACTION")? {
            self.transition_fraction = v;
        }
        if let Some(v) = env_parse("REVEAL_STAGE_TIMEOUT_SECS")? {
            self.stage_timeout_secs = Some(v);
        }
        if let Some(v) = env_flag("REVEAL_KEEP_WORK_DIR") {
            self.keep_work_dir = v;
        }
        Ok(())
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.experiment.trim().is_empty() {
            return Err(WorkerError::config_error("experiment name is required"));
        }
        if self.frames_per_cycle == 0 {
            return Err(WorkerError::config_error("frames_per_cycle must be positive"));
        }
        if let SourceFrameRate::Fixed(fps) = self.frame_rates.source {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(WorkerError::config_error(format!("source frame rate {} must be positive", fps)));
            }
        }
        if !(self.frame_rates.blended.is_finite() && self.frame_rates.blended > 0.0) {
            return Err(WorkerError::config_error(format!(
                "blended frame rate {} must be positive",
                self.frame_rates.blended
            )));
        }
        if !(0.0..=1.0).contains(&self.transition_fraction) {
            return Err(WorkerError::config_error(format!(
                "transition_fraction {} outside [0, 1]",
                self.transition_fraction
            )));
        }
        if !(self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0) {
            return Err(WorkerError::config_error(format!(
                "aspect_ratio {} must be positive",
                self.aspect_ratio
            )));
        }
        if self.video_extension.trim().is_empty() && self.label_file.is_none() {
            return Err(WorkerError::config_error("video_extension is required when scanning video_dir"));
        }
        if self.classify_enabled() && self.classifier_weights.as_os_str().is_empty() {
            return Err(WorkerError::config_error("classifier_weights is required for classification"));
        }
        if self.stage_timeout_secs == Some(0) {
            return Err(WorkerError::config_error("stage_timeout_secs must be positive"));
        }
        Ok(())
    }

    /// Whether any classifier overlay runs.
    pub fn classify_enabled(&self) -> bool {
        self.cam || self.timeofday_classify
    }

    /// Classifier passes in run order.
    pub fn classifier_modes(&self) -> Vec<ClassifierMode> {
        let mut modes = Vec::new();
        if self.cam {
            modes.push(ClassifierMode::Cam);
        }
        if self.timeofday_classify {
            modes.push(ClassifierMode::ClassOnly);
        }
        modes
    }

    /// Frame set revealed in the classified blend.
    pub fn classified_blend_pattern(&self) -> FramePattern {
        if self.use_second_label {
            FramePattern::ClassifiedTransformedSecond
        } else {
            FramePattern::ClassifiedTransformed
        }
    }

    /// `_<experiment><checkpoint tag>`, shared by working and output directories.
    pub fn run_tag(&self) -> String {
        format!("_{}{}", self.experiment, self.checkpoint.tag())
    }

    /// Make the data directories absolute against the current directory.
    ///
    /// The python tools run from `project_root`, so relative data paths
    /// handed to them would resolve somewhere else. Script paths stay
    /// relative to `project_root`.
    pub fn resolve_paths(&mut self) -> WorkerResult<()> {
        self.video_dir = absolute_path(&self.video_dir)?;
        self.out_dir = absolute_path(&self.out_dir)?;
        self.project_root = absolute_path(&self.project_root)?;
        if let Some(label_file) = &self.label_file {
            self.label_file = Some(absolute_path(label_file)?);
        }
        Ok(())
    }

    /// Working directory of one source video.
    pub fn work_dir_for(&self, basename: &str) -> PathBuf {
        self.video_dir.join(format!("{}{}", basename, self.run_tag()))
    }

    /// Directory the videos of this batch are written to.
    pub fn output_dir(&self) -> PathBuf {
        let mut name = self.out_dir.clone().into_os_string();
        name.push(self.run_tag());
        PathBuf::from(name)
    }
}

fn absolute_path(path: &Path) -> WorkerResult<PathBuf> {
    std::path::absolute(path)
        .map_err(|e| WorkerError::config_error(format!("cannot resolve {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_paths() {
        let mut config = PipelineConfig {
            video_dir: PathBuf::from("videos"),
            out_dir: PathBuf::from("/data/converted"),
            label_file: Some(PathBuf::from("labels.json")),
            ..Default::default()
        };
        config.resolve_paths().unwrap();

        let cwd = std::env::current_dir().unwrap();
        assert_eq!(config.video_dir, cwd.join("videos"));
        assert_eq!(config.out_dir, PathBuf::from("/data/converted"));
        assert_eq!(config.label_file, Some(cwd.join("labels.json")));
        assert!(config.project_root.is_absolute());
        assert_eq!(config.inference_script, PathBuf::from("./nightdrive_test.py"));
        assert!(config.work_dir_for("clip").is_absolute());
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.frames_per_cycle, 600);
        assert_eq!(config.frame_rates.blended, 60.0);
        assert!(!config.classify_enabled());
    }

    #[test]
    fn test_directory_naming() {
        let config = PipelineConfig {
            video_dir: PathBuf::from("/data/videos"),
            out_dir: PathBuf::from("/data/converted"),
            experiment: "cgan_v032".to_string(),
            checkpoint: Checkpoint::Epoch(14),
            ..Default::default()
        };
        assert_eq!(config.run_tag(), "_cgan_v032_e14");
        assert_eq!(config.work_dir_for("clip"), PathBuf::from("/data/videos/clip_cgan_v032_e14"));
        assert_eq!(config.output_dir(), PathBuf::from("/data/converted_cgan_v032_e14"));

        let config = PipelineConfig {
            checkpoint: Checkpoint::Iteration(130000),
            ..config
        };
        assert_eq!(config.output_dir(), PathBuf::from("/data/converted_cgan_v032_i130000"));
    }

    #[test]
    fn test_validate_rejects_zero_cycle() {
        let config = PipelineConfig {
            frames_per_cycle: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(WorkerError::ConfigError(_))));
    }

    #[test]
    fn test_validate_rejects_bad_rates() {
        let mut config = PipelineConfig::default();
        config.frame_rates.blended = 0.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.transition_fraction = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_classifier_modes() {
        let config = PipelineConfig {
            cam: true,
            timeofday_classify: true,
            ..Default::default()
        };
        assert_eq!(config.classifier_modes(), vec![ClassifierMode::Cam, ClassifierMode::ClassOnly]);
        assert_eq!(config.classified_blend_pattern(), FramePattern::ClassifiedTransformed);

        let config = PipelineConfig {
            timeofday_classify: true,
            use_second_label: true,
            ..Default::default()
        };
        assert_eq!(config.classifier_modes(), vec![ClassifierMode::ClassOnly]);
        assert_eq!(config.classified_blend_pattern(), FramePattern::ClassifiedTransformedSecond);
    }

    #[test]
    fn test_from_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reveal.json");
        std::fs::write(
            &path,
            r#"{"experiment": "night", "checkpoint": "i500", "frame_rates": {"source": "auto"}, "cam": true}"#,
        )
        .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.experiment, "night");
        assert_eq!(config.checkpoint, Checkpoint::Iteration(500));
        assert_eq!(config.frame_rates.source, SourceFrameRate::Auto);
        assert_eq!(config.frame_rates.blended, 60.0);
        assert!(config.cam);
        assert_eq!(config.load_size, 1280);
    }

    #[test]
    fn test_from_file_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(PipelineConfig::from_file(&path), Err(WorkerError::ConfigError(_))));
    }
}
