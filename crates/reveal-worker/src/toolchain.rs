//! External tools driven by the pipeline.
//!
//! The orchestrator only talks to [`Toolchain`]; [`ExternalToolchain`] runs
//! the real FFmpeg and python processes. Tests substitute a scripted
//! implementation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use reveal_media::{
    check_ffmpeg, check_ffprobe, encode_frames, probe_frame_rate, split_video, stack_videos, FfmpegRunner,
    StackOrientation,
};
use reveal_models::{Checkpoint, Direction, EncodingConfig, FramePattern, OutStyle, SourceFrameRate};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::external::ExternalCommand;

/// Overlay drawn by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassifierMode {
    /// Class activation map plus label
    Cam,
    /// Class label only
    ClassOnly,
}

impl ClassifierMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierMode::Cam => "cam",
            ClassifierMode::ClassOnly => "classonly",
        }
    }

    pub fn font_scale(&self) -> f32 {
        match self {
            ClassifierMode::Cam => 1.8,
            ClassifierMode::ClassOnly => 2.2,
        }
    }

    pub fn font_outline(&self) -> u32 {
        match self {
            ClassifierMode::Cam => 3,
            ClassifierMode::ClassOnly => 4,
        }
    }
}

impl std::fmt::Display for ClassifierMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The external processes a pipeline run depends on.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Decode `video` into `frame-<n>` images inside `work_dir`, returning
    /// the number of frames.
    async fn split(&self, video: &Path, work_dir: &Path) -> WorkerResult<usize>;

    /// Run the translation model over the frames in `work_dir`.
    async fn transform(&self, work_dir: &Path) -> WorkerResult<()>;

    /// Overlay classifier output on the frames whose names start with
    /// `frame-<suffix>`.
    async fn classify(&self, work_dir: &Path, mode: ClassifierMode, suffix: &str) -> WorkerResult<()>;

    /// Encode one frame set into a video, returning the number of frames.
    async fn encode(&self, work_dir: &Path, pattern: FramePattern, fps: f64, output: &Path) -> WorkerResult<usize>;

    /// Stack two finished videos.
    async fn stack(
        &self,
        first: &Path,
        second: &Path,
        orientation: StackOrientation,
        fps: f64,
        output: &Path,
    ) -> WorkerResult<()>;

    /// Frame rate of a video, `None` when it cannot be determined.
    async fn probe_frame_rate(&self, video: &Path) -> WorkerResult<Option<f64>>;
}

/// Settings of the translation model's inference run.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceSettings {
    pub script: PathBuf,
    pub experiment: String,
    pub checkpoint: Checkpoint,
    pub direction: Direction,
    pub out_style: OutStyle,
    pub gpu_ids: String,
    pub load_size: u32,
    pub batch_size: u32,
}

/// FFmpeg plus the python inference and classifier scripts.
#[derive(Debug, Clone)]
pub struct ExternalToolchain {
    ffmpeg: FfmpegRunner,
    encoding: EncodingConfig,
    python: String,
    project_root: PathBuf,
    inference: InferenceSettings,
    classifier_script: PathBuf,
    classifier_weights: PathBuf,
    timeout_secs: Option<u64>,
    probes_source: bool,
}

impl ExternalToolchain {
    pub fn new(config: &PipelineConfig) -> Self {
        let mut ffmpeg = FfmpegRunner::new();
        if let Some(secs) = config.stage_timeout_secs {
            ffmpeg = ffmpeg.with_timeout(secs);
        }

        Self {
            ffmpeg,
            encoding: config.encoding.clone(),
            python: config.python.clone(),
            project_root: config.project_root.clone(),
            inference: InferenceSettings {
                script: config.inference_script.clone(),
                experiment: config.experiment.clone(),
                checkpoint: config.checkpoint,
                direction: Direction::AtoB,
                out_style: OutStyle::Frames,
                gpu_ids: config.gpu_ids.clone(),
                load_size: config.load_size,
                batch_size: config.batch_size,
            },
            classifier_script: config.classifier_script.clone(),
            classifier_weights: config.classifier_weights.clone(),
            timeout_secs: config.stage_timeout_secs,
            probes_source: config.frame_rates.source == SourceFrameRate::Auto,
        }
    }

    /// Verify that the required programs are installed.
    pub fn check(&self) -> WorkerResult<()> {
        check_ffmpeg()?;
        if self.probes_source {
            check_ffprobe()?;
        }
        which::which(&self.python).map_err(|_| WorkerError::ToolNotFound(self.python.clone()))?;
        Ok(())
    }

    /// Inference command over one working directory.
    pub fn inference_command(&self, work_dir: &Path) -> ExternalCommand {
        let settings = &self.inference;
        let work_dir = absolute_or_same(work_dir);
        ExternalCommand::new(&self.python)
            .path_arg(&settings.script)
            .args(["--model", "test"])
            .args(["--direction", settings.direction.as_str()])
            .args(["--phase", "test", "--no_dropout", "--preprocess", "none"])
            .arg("--load_size")
            .arg(settings.load_size.to_string())
            .arg("--gpu_ids")
            .arg(settings.gpu_ids.clone())
            .args(["--dataset_mode", "single"])
            .args(["--out_style", settings.out_style.as_str()])
            .arg("--dataroot")
            .path_arg(&work_dir)
            .arg("--results_dir")
            .path_arg(&work_dir)
            .arg("--name")
            .arg(settings.experiment.clone())
            .args(settings.checkpoint.inference_args())
            .args(["--num_test", "-1", "--norm", "instance"])
            .arg("--batch_size")
            .arg(settings.batch_size.to_string())
            .args(["--model_suffix", "_A"])
            .current_dir(&self.project_root)
            .timeout(self.timeout_secs)
    }

    /// Classifier command for one frame set.
    pub fn classifier_command(&self, work_dir: &Path, mode: ClassifierMode, suffix: &str) -> ExternalCommand {
        let mut cmd = ExternalCommand::new(&self.python)
            .path_arg(&self.classifier_script)
            .arg("--path")
            .path_arg(&absolute_or_same(work_dir))
            .arg("--suffix")
            .arg(suffix)
            .arg("--weights")
            .path_arg(&self.classifier_weights);
        if mode == ClassifierMode::ClassOnly {
            cmd = cmd.arg("--classonly");
        }
        cmd.arg("--firstlabel")
            .arg("--fontscale")
            .arg(mode.font_scale().to_string())
            .arg("--fontoutline")
            .arg(mode.font_outline().to_string())
            .current_dir(&self.project_root)
            .timeout(self.timeout_secs)
    }
}

/// The tools run from the project root, so data paths must not be relative.
fn absolute_or_same(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[async_trait]
impl Toolchain for ExternalToolchain {
    async fn split(&self, video: &Path, work_dir: &Path) -> WorkerResult<usize> {
        Ok(split_video(&self.ffmpeg, video, work_dir, &self.encoding.frame_extension).await?)
    }

    async fn transform(&self, work_dir: &Path) -> WorkerResult<()> {
        self.inference_command(work_dir).run().await
    }

    async fn classify(&self, work_dir: &Path, mode: ClassifierMode, suffix: &str) -> WorkerResult<()> {
        info!(mode = %mode, suffix, "Running classifier overlay");
        self.classifier_command(work_dir, mode, suffix).run().await
    }

    async fn encode(&self, work_dir: &Path, pattern: FramePattern, fps: f64, output: &Path) -> WorkerResult<usize> {
        Ok(encode_frames(
            &self.ffmpeg,
            work_dir,
            pattern.prefix(),
            &self.encoding.frame_extension,
            fps,
            output,
            &self.encoding,
        )
        .await?)
    }

    async fn stack(
        &self,
        first: &Path,
        second: &Path,
        orientation: StackOrientation,
        fps: f64,
        output: &Path,
    ) -> WorkerResult<()> {
        Ok(stack_videos(&self.ffmpeg, first, second, orientation, fps, output, &self.encoding).await?)
    }

    async fn probe_frame_rate(&self, video: &Path) -> WorkerResult<Option<f64>> {
        Ok(probe_frame_rate(video).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toolchain() -> ExternalToolchain {
        ExternalToolchain::new(&PipelineConfig {
            experiment: "cgan_v032".to_string(),
            checkpoint: Checkpoint::Epoch(14),
            project_root: PathBuf::from("/opt/cyclegan"),
            classifier_script: PathBuf::from("/opt/nd/timeofday_cam.py"),
            classifier_weights: PathBuf::from("/opt/nd/best.pth"),
            stage_timeout_secs: Some(600),
            ..Default::default()
        })
    }

    #[test]
    fn test_inference_command() {
        let cmd = toolchain().inference_command(Path::new("/videos/clip_cgan_v032_e14"));
        assert_eq!(cmd.program(), "python3");
        assert_eq!(
            cmd.display(),
            "python3 ./nightdrive_test.py --model test --direction AtoB --phase test --no_dropout \
             --preprocess none --load_size 1280 --gpu_ids 0 --dataset_mode single --out_style frames \
             --dataroot /videos/clip_cgan_v032_e14 --results_dir /videos/clip_cgan_v032_e14 \
             --name cgan_v032 --epoch 14 --num_test -1 --norm instance --batch_size 32 --model_suffix _A"
        );
    }

    #[test]
    fn test_relative_work_dir_made_absolute() {
        let tc = toolchain();
        let cwd = std::env::current_dir().unwrap();
        let expected = cwd.join("videos/clip_cgan_v032_e14").to_string_lossy().to_string();

        let cmd = tc.inference_command(Path::new("videos/clip_cgan_v032_e14"));
        let args = cmd.get_args();
        let at = args.iter().position(|a| a == "--dataroot").unwrap();
        assert_eq!(args[at + 1], expected);
        assert_eq!(args[at + 3], expected);

        let cmd = tc.classifier_command(Path::new("videos/clip_cgan_v032_e14"), ClassifierMode::Cam, "");
        let args = cmd.get_args();
        let at = args.iter().position(|a| a == "--path").unwrap();
        assert_eq!(args[at + 1], expected);
    }

    #[test]
    fn test_inference_command_iteration() {
        let mut config = PipelineConfig::default();
        config.checkpoint = Checkpoint::Iteration(130000);
        let cmd = ExternalToolchain::new(&config).inference_command(Path::new("/w"));
        let args = cmd.get_args();
        let at = args.iter().position(|a| a == "--load_iter").unwrap();
        assert_eq!(args[at + 1], "130000");
        assert!(!args.iter().any(|a| a == "--epoch"));
    }

    #[test]
    fn test_ffprobe_required_only_for_auto_rate() {
        assert!(!toolchain().probes_source);

        let mut config = PipelineConfig::default();
        config.frame_rates.source = SourceFrameRate::Auto;
        assert!(ExternalToolchain::new(&config).probes_source);
    }

    #[test]
    fn test_classifier_command_modes() {
        let tc = toolchain();

        let cam = tc.classifier_command(Path::new("/w"), ClassifierMode::Cam, "transfer_AtoB-");
        assert_eq!(
            cam.display(),
            "python3 /opt/nd/timeofday_cam.py --path /w --suffix transfer_AtoB- --weights /opt/nd/best.pth \
             --firstlabel --fontscale 1.8 --fontoutline 3"
        );

        let class_only = tc.classifier_command(Path::new("/w"), ClassifierMode::ClassOnly, "");
        let args = class_only.get_args();
        let at = args.iter().position(|a| a == "--suffix").unwrap();
        assert_eq!(args[at + 1], "");
        assert!(args.iter().any(|a| a == "--classonly"));
        assert!(class_only.display().ends_with("--fontscale 2.2 --fontoutline 4"));
    }
}
