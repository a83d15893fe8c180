//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::{is_progress_line, FfmpegProgress};

/// Number of diagnostic stderr lines kept for error reports
const STDERR_TAIL_LINES: usize = 20;

/// How long output readers may lag behind process exit
const READER_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
struct FfmpegInput {
    /// Arguments placed before this input's `-i`
    args: Vec<String>,
    path: PathBuf,
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<FfmpegInput>,
    output: PathBuf,
    /// Output arguments (after the last -i)
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            inputs: vec![FfmpegInput {
                args: Vec::new(),
                path: input.as_ref().to_path_buf(),
            }],
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add another input. Later `input_arg` calls apply to it.
    pub fn add_input(mut self, input: impl AsRef<Path>) -> Self {
        self.inputs.push(FfmpegInput {
            args: Vec::new(),
            path: input.as_ref().to_path_buf(),
        });
        self
    }

    /// Add an argument before the most recently added `-i`.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        if let Some(input) = self.inputs.last_mut() {
            input.args.push(arg.into());
        }
        self
    }

    /// Add multiple input arguments.
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(input) = self.inputs.last_mut() {
            input.args.extend(args.into_iter().map(Into::into));
        }
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Override the rate of the current input.
    pub fn input_frame_rate(self, fps: f64) -> Self {
        self.input_arg("-r").input_arg(format_rate(fps))
    }

    /// Read the current input as an image sequence.
    pub fn image_sequence(self) -> Self {
        self.input_arg("-f").input_arg("image2")
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Number the first written image.
    pub fn start_number(self, n: u64) -> Self {
        self.output_arg("-start_number").output_arg(n.to_string())
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Render a frame rate without a trailing `.0` for whole numbers.
pub(crate) fn format_rate(fps: f64) -> String {
    if fps.fract() == 0.0 {
        format!("{}", fps as i64)
    } else {
        format!("{}", fps)
    }
}

/// Runner for FFmpeg commands with progress tracking and timeout.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    binary: PathBuf,
    timeout_secs: Option<u64>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            timeout_secs: None,
        }
    }

    /// Use a specific ffmpeg binary instead of the one on PATH.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        self.timeout_secs
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |progress| {
            trace!(frame = progress.frame, fps = progress.fps, "FFmpeg progress");
        })
        .await
    }

    /// Run an FFmpeg command with progress callback.
    ///
    /// On failure the error carries the last diagnostic lines FFmpeg wrote
    /// to stderr.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, progress_callback: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        which::which(&self.binary).map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", self.binary.display(), args.join(" "));

        let mut command = Command::new(&self.binary);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = own_process_group(&mut command).spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr not captured"))?;
        let mut reader = BufReader::new(stderr).lines();

        let stderr_handle = tokio::spawn(async move {
            let mut current = FfmpegProgress::default();
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

            while let Ok(Some(line)) = reader.next_line().await {
                if is_progress_line(&line) {
                    if let Some(progress) = current.update(&line) {
                        progress_callback(progress);
                    }
                } else if !line.trim().is_empty() {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let status = wait_for_exit(&mut child, self.timeout_secs, "FFmpeg").await;
        let stderr_tail = join_reader(stderr_handle).await;
        let status = status?;

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                format!("FFmpeg exited with {}", status),
                (!stderr_tail.is_empty()).then_some(stderr_tail),
                status.code(),
            ))
        }
    }
}

/// Start the child in a process group of its own, so that a timeout also
/// reaches the processes it spawned.
pub fn own_process_group(command: &mut Command) -> &mut Command {
    #[cfg(unix)]
    command.process_group(0);
    command
}

#[cfg(unix)]
fn kill_process_group(child: &Child, label: &str) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    // ESRCH when the child was not started as a group leader
    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        debug!("Process group of {} not killed: {}", label, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child, _label: &str) {}

/// Wait for an output reader task.
///
/// A descendant that outlives the process can keep its pipes open, so the
/// reader is aborted once [`READER_GRACE`] has passed.
pub async fn join_reader<T: Default>(mut handle: JoinHandle<T>) -> T {
    match tokio::time::timeout(READER_GRACE, &mut handle).await {
        Ok(result) => result.unwrap_or_default(),
        Err(_) => {
            warn!("Output reader still open after process exit, dropping it");
            handle.abort();
            T::default()
        }
    }
}

/// Wait for a child process, killing it and its process group once
/// `timeout_secs` elapses.
pub async fn wait_for_exit(
    child: &mut Child,
    timeout_secs: Option<u64>,
    label: &str,
) -> MediaResult<ExitStatus> {
    let Some(secs) = timeout_secs else {
        return Ok(child.wait().await?);
    };

    match tokio::time::timeout(Duration::from_secs(secs), child.wait()).await {
        Ok(status) => Ok(status?),
        Err(_) => {
            warn!("{} timed out after {} seconds, killing process", label, secs);
            kill_process_group(child, label);
            if let Err(e) = child.kill().await {
                warn!("Failed to kill {}: {}", label, e);
            }
            Err(MediaError::Timeout(secs))
        }
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder_single_input() {
        let args = FfmpegCommand::new("clip.mov", "/tmp/w/frame-%d.png")
            .start_number(0)
            .build_args();

        assert_eq!(
            args,
            vec![
                "-y", "-v", "error", "-progress", "pipe:2", "-i", "clip.mov", "-start_number", "0",
                "/tmp/w/frame-%d.png",
            ]
        );
    }

    #[test]
    fn test_command_builder_input_args_follow_last_input() {
        let args = FfmpegCommand::new("a.mp4", "out.mp4")
            .input_frame_rate(30.0)
            .add_input("b.mp4")
            .filter_complex("hstack=inputs=2")
            .build_args();

        let a = args.iter().position(|s| s == "a.mp4").unwrap();
        let b = args.iter().position(|s| s == "b.mp4").unwrap();
        let r = args.iter().position(|s| s == "-r").unwrap();
        assert_eq!(args[r + 1], "30");
        assert!(r < a && a < b);
        assert_eq!(args[b + 1], "-filter_complex");
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(60.0), "60");
        assert_eq!(format_rate(29.97), "29.97");
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let runner = FfmpegRunner::new().with_binary("/nonexistent/ffmpeg-binary");
        let cmd = FfmpegCommand::new("in.mp4", "out.mp4");
        let err = runner.run(&cmd).await.unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_wait_for_exit_timeout_kills_child() {
        let mut child = Command::new("sleep").arg("5").spawn().unwrap();
        let err = wait_for_exit(&mut child, Some(0), "sleep").await.unwrap_err();
        assert!(matches!(err, MediaError::Timeout(0)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_descendants_holding_pipes() {
        let mut command = Command::new("sh");
        command
            .args(["-c", "sleep 30 & sleep 30"])
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        let mut child = own_process_group(&mut command).spawn().unwrap();
        let stderr = child.stderr.take().unwrap();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(_)) = lines.next_line().await {}
        });

        let started = std::time::Instant::now();
        let err = wait_for_exit(&mut child, Some(1), "sh").await.unwrap_err();
        join_reader(reader).await;

        assert!(matches!(err, MediaError::Timeout(1)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_join_reader_gives_up() {
        let reader = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            7u32
        });
        let started = std::time::Instant::now();
        assert_eq!(join_reader(reader).await, 0);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_wait_for_exit_reports_status() {
        let mut child = Command::new("true").spawn().unwrap();
        let status = wait_for_exit(&mut child, Some(5), "true").await.unwrap();
        assert!(status.success());
    }
}
