//! End-to-end pipeline runs over a scripted toolchain.

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

use reveal_media::{FrameIndexer, FrameSequence, StackOrientation};
use reveal_models::{Checkpoint, FramePattern, PipelineStage, RunState, SourceFrameRate};
use reveal_worker::{ClassifierMode, Orchestrator, PipelineConfig, Toolchain, WorkerError, WorkerResult};

const FRAMES: u64 = 6;

/// Toolchain that writes small PNG frames instead of running real tools.
#[derive(Default)]
struct FakeToolchain {
    /// Video file name -> stage whose external call fails
    failures: HashMap<String, PipelineStage>,
    calls: Mutex<Vec<String>>,
}

impl FakeToolchain {
    fn failing(video: &str, stage: PipelineStage) -> Self {
        Self {
            failures: HashMap::from([(video.to_string(), stage)]),
            ..Default::default()
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Video a working directory belongs to, e.g. `b.mov` for `b_cgan_e14`.
    fn fails_at(&self, work_dir: &Path, stage: PipelineStage) -> bool {
        let dir_name = work_dir.file_name().unwrap().to_str().unwrap();
        self.failures.iter().any(|(video, failing)| {
            let stem = video.trim_end_matches(".mov");
            *failing == stage && dir_name.starts_with(&format!("{}_", stem))
        })
    }

    fn exit_failure(program: &str) -> WorkerError {
        WorkerError::ExternalStageFailed {
            program: program.to_string(),
            exit_code: Some(1),
            stderr: Some("scripted failure".to_string()),
        }
    }
}

fn write_frame(path: &Path, value: u8) {
    RgbImage::from_pixel(16, 8, Rgb([value, value, value]))
        .save(path)
        .unwrap();
}

fn frame_ids(dir: &Path, prefix: &str) -> Vec<u64> {
    FrameSequence::scan(dir, &FrameIndexer::new(prefix).unwrap())
        .unwrap()
        .frame_ids()
        .collect()
}

#[async_trait]
impl Toolchain for FakeToolchain {
    async fn split(&self, video: &Path, work_dir: &Path) -> WorkerResult<usize> {
        self.record(format!("split:{}", video.file_name().unwrap().to_str().unwrap()));
        if self.fails_at(work_dir, PipelineStage::Split) {
            return Err(Self::exit_failure("ffmpeg"));
        }
        for i in 0..FRAMES {
            write_frame(&work_dir.join(format!("frame-{}.png", i)), 10);
        }
        Ok(FRAMES as usize)
    }

    async fn transform(&self, work_dir: &Path) -> WorkerResult<()> {
        self.record("transform".to_string());
        if self.fails_at(work_dir, PipelineStage::Transform) {
            return Err(Self::exit_failure("python3"));
        }
        for id in frame_ids(work_dir, "frame-") {
            write_frame(&work_dir.join(format!("frame-transfer_AtoB-{}.png", id)), 200);
        }
        Ok(())
    }

    async fn classify(&self, work_dir: &Path, mode: ClassifierMode, suffix: &str) -> WorkerResult<()> {
        self.record(format!("classify:{}:{}", mode, suffix));
        let prefix = format!("frame-{}", suffix);
        for id in frame_ids(work_dir, &prefix) {
            write_frame(&work_dir.join(format!("{}cam-{}.png", prefix, id)), 90);
        }
        Ok(())
    }

    async fn encode(&self, work_dir: &Path, pattern: FramePattern, fps: f64, output: &Path) -> WorkerResult<usize> {
        self.record(format!("encode:{}:{}", pattern.prefix(), fps));
        let frames = frame_ids(work_dir, pattern.prefix()).len();
        if frames == 0 {
            return Err(reveal_media::MediaError::empty_sequence(pattern.prefix(), work_dir).into());
        }
        std::fs::write(output, b"video").unwrap();
        Ok(frames)
    }

    async fn stack(
        &self,
        first: &Path,
        second: &Path,
        orientation: StackOrientation,
        fps: f64,
        output: &Path,
    ) -> WorkerResult<()> {
        assert!(first.exists(), "missing stack input {}", first.display());
        assert!(second.exists(), "missing stack input {}", second.display());
        self.record(format!("stack:{}:{}", orientation, fps));
        std::fs::write(output, b"video").unwrap();
        Ok(())
    }

    async fn probe_frame_rate(&self, _video: &Path) -> WorkerResult<Option<f64>> {
        self.record("probe".to_string());
        Ok(Some(25.0))
    }
}

struct Fixture {
    _root: TempDir,
    video_dir: PathBuf,
    out_dir: PathBuf,
}

impl Fixture {
    fn new(videos: &[&str]) -> Self {
        let root = TempDir::new().unwrap();
        let video_dir = root.path().join("videos");
        std::fs::create_dir(&video_dir).unwrap();
        for name in videos {
            std::fs::write(video_dir.join(name), b"source").unwrap();
        }
        let out_dir = root.path().join("converted");
        Self {
            _root: root,
            video_dir,
            out_dir,
        }
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig {
            video_dir: self.video_dir.clone(),
            out_dir: self.out_dir.clone(),
            experiment: "cgan".to_string(),
            checkpoint: Checkpoint::Epoch(14),
            frames_per_cycle: 4,
            ..Default::default()
        }
    }

    fn video(&self, name: &str) -> PathBuf {
        self.video_dir.join(name)
    }
}

#[tokio::test]
async fn test_transform_failure_preserves_work_dir() {
    let fixture = Fixture::new(&["a.mov"]);
    let orchestrator = Orchestrator::new(
        fixture.config(),
        FakeToolchain::failing("a.mov", PipelineStage::Transform),
    )
    .unwrap();

    let run = orchestrator.run_video(&fixture.video("a.mov")).await;

    assert_eq!(run.state(), RunState::Failed(PipelineStage::Transform));
    assert!(run.work_dir().is_dir());
    assert!(run.artifacts().is_empty());

    // blend never wrote frames and the encoder was never called
    assert!(frame_ids(run.work_dir(), "frame-blended-").is_empty());
    let calls = orchestrator.toolchain().calls();
    assert_eq!(calls, vec!["split:a.mov", "transform"]);

    let err = run.error().unwrap();
    assert_eq!(err.stage(), Some(PipelineStage::Transform));
    assert_eq!(err.exit_code(), Some(1));
    assert!(err.is_external());
}

#[tokio::test]
async fn test_batch_continues_after_failure() {
    let fixture = Fixture::new(&["a.mov", "b.mov", "c.mov"]);
    let orchestrator = Orchestrator::new(
        fixture.config(),
        FakeToolchain::failing("b.mov", PipelineStage::Split),
    )
    .unwrap();

    let sources: Vec<PathBuf> = ["a.mov", "b.mov", "c.mov"].iter().map(|n| fixture.video(n)).collect();
    let report = orchestrator.run_batch(&sources).await;

    let states: Vec<RunState> = report.runs().iter().map(|r| r.state()).collect();
    assert_eq!(
        states,
        vec![RunState::Done, RunState::Failed(PipelineStage::Split), RunState::Done]
    );
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    assert!(!report.all_done());

    // successful runs clean up, the failed one keeps its directory
    assert!(!report.runs()[0].work_dir().exists());
    assert!(report.runs()[1].work_dir().exists());
    assert!(!report.runs()[2].work_dir().exists());
}

#[tokio::test]
async fn test_successful_run_writes_all_videos() {
    let fixture = Fixture::new(&["clip.mov"]);
    let orchestrator = Orchestrator::new(fixture.config(), FakeToolchain::default()).unwrap();

    let run = orchestrator.run_video(&fixture.video("clip.mov")).await;

    assert_eq!(run.state(), RunState::Done);
    assert!(run.error().is_none());
    assert!(!run.work_dir().exists());

    let out = fixture.out_dir.with_file_name("converted_cgan_e14");
    let mut written: Vec<String> = run
        .artifacts()
        .iter()
        .map(|p| {
            assert_eq!(p.parent().unwrap(), out);
            assert!(p.exists());
            p.file_name().unwrap().to_str().unwrap().to_string()
        })
        .collect();
    written.sort();
    assert_eq!(
        written,
        vec!["clip-blended.mp4", "clip-hstack.mp4", "clip-transfer_AtoB.mp4", "clip-vstack.mp4"]
    );

    let calls = orchestrator.toolchain().calls();
    assert!(calls.contains(&"encode:frame-blended-:60".to_string()));
    assert!(calls.contains(&"encode:frame-transfer_AtoB-:30".to_string()));
    assert!(calls.contains(&"stack:hstack:30".to_string()));
    assert!(calls.contains(&"stack:vstack:30".to_string()));
    assert!(!calls.iter().any(|c| c.starts_with("classify") || c == "probe"));
}

#[tokio::test]
async fn test_classified_run_with_probed_rate() {
    let fixture = Fixture::new(&["clip.mov"]);
    let mut config = fixture.config();
    config.timeofday_classify = true;
    config.frame_rates.source = SourceFrameRate::Auto;
    config.keep_work_dir = true;
    let orchestrator = Orchestrator::new(config, FakeToolchain::default()).unwrap();

    let run = orchestrator.run_video(&fixture.video("clip.mov")).await;
    assert_eq!(run.state(), RunState::Done, "{:?}", run.error());
    assert_eq!(run.artifacts().len(), 9);

    // both blends ran over all six frame ids
    assert_eq!(frame_ids(run.work_dir(), "frame-blended-"), (0..FRAMES).collect::<Vec<_>>());
    assert_eq!(frame_ids(run.work_dir(), "frame-cam-blended-"), (0..FRAMES).collect::<Vec<_>>());

    let calls = orchestrator.toolchain().calls();
    let classify: Vec<&String> = calls.iter().filter(|c| c.starts_with("classify")).collect();
    assert_eq!(classify, vec!["classify:classonly:transfer_AtoB-", "classify:classonly:"]);
    assert!(calls.contains(&"probe".to_string()));
    assert!(calls.contains(&"encode:frame-cam-:25".to_string()));
    assert!(calls.contains(&"encode:frame-cam-blended-:60".to_string()));
    assert!(calls.contains(&"stack:hstack:25".to_string()));
}

#[tokio::test]
async fn test_second_label_without_frames_fails_classified_blend() {
    let fixture = Fixture::new(&["clip.mov"]);
    let mut config = fixture.config();
    config.cam = true;
    config.use_second_label = true;
    let orchestrator = Orchestrator::new(config, FakeToolchain::default()).unwrap();

    let run = orchestrator.run_video(&fixture.video("clip.mov")).await;

    // the fake classifier never writes second-label frames
    assert_eq!(run.state(), RunState::Failed(PipelineStage::BlendClassified));
    assert!(run.work_dir().exists());
    assert!(!orchestrator.toolchain().calls().iter().any(|c| c.starts_with("encode")));
}

#[tokio::test]
async fn test_missing_source_fails_at_split() {
    let fixture = Fixture::new(&[]);
    let orchestrator = Orchestrator::new(fixture.config(), FakeToolchain::default()).unwrap();

    let run = orchestrator.run_video(&fixture.video("ghost.mov")).await;

    assert_eq!(run.state(), RunState::Failed(PipelineStage::Split));
    assert!(!run.work_dir().exists());
    assert!(orchestrator.toolchain().calls().is_empty());
}

#[test]
fn test_invalid_config_rejected() {
    let config = PipelineConfig {
        frames_per_cycle: 0,
        ..Default::default()
    };
    assert!(matches!(
        Orchestrator::new(config, FakeToolchain::default()),
        Err(WorkerError::ConfigError(_))
    ));
}

#[tokio::test]
async fn test_relative_dirs_resolved_before_run() {
    let config = PipelineConfig {
        video_dir: PathBuf::from("videos"),
        out_dir: PathBuf::from("videos_converted"),
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(config, FakeToolchain::default()).unwrap();

    let cwd = std::env::current_dir().unwrap();
    assert_eq!(orchestrator.config().video_dir, cwd.join("videos"));
    assert!(orchestrator.config().project_root.is_absolute());

    // missing source, so nothing is created under the current directory
    let run = orchestrator.run_video(Path::new("videos/ghost.mov")).await;
    assert_eq!(run.state(), RunState::Failed(PipelineStage::Split));
    assert!(run.work_dir().is_absolute());
    assert!(run.output_dir().starts_with(&cwd));
}
