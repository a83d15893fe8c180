//! Running the external python tools.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use reveal_media::command::{join_reader, own_process_group, wait_for_exit};
use reveal_media::MediaError;

use crate::error::{WorkerError, WorkerResult};

/// Number of stderr lines kept for error reports
const STDERR_TAIL_LINES: usize = 20;

/// An external command run to completion with an optional timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    timeout_secs: Option<u64>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            timeout_secs: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append a path argument.
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().to_string())
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn timeout(mut self, secs: Option<u64>) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Command line for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the command, failing on a non-zero exit.
    ///
    /// Output is logged at debug level; the last stderr lines are attached
    /// to the error.
    pub async fn run(&self) -> WorkerResult<()> {
        which::which(&self.program).map_err(|_| WorkerError::ToolNotFound(self.program.clone()))?;

        debug!("Running: {}", self.display());

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        let mut child = own_process_group(&mut command).spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WorkerError::internal("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| WorkerError::internal("stderr not captured"))?;

        let program = self.program.clone();
        let stdout_handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(program = %program, "{}", line);
            }
        });

        let program = self.program.clone();
        let stderr_handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(program = %program, stream = "stderr", "{}", line);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let status = wait_for_exit(&mut child, self.timeout_secs, &self.program).await;
        join_reader(stdout_handle).await;
        let stderr_tail = join_reader(stderr_handle).await;

        let status = status.map_err(|e| match e {
            MediaError::Timeout(secs) => WorkerError::StageTimeout {
                program: self.program.clone(),
                secs,
            },
            MediaError::Io(io) => WorkerError::Io(io),
            other => WorkerError::from(other),
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(WorkerError::ExternalStageFailed {
                program: self.program.clone(),
                exit_code: status.code(),
                stderr: (!stderr_tail.is_empty()).then_some(stderr_tail),
            })
        }
    }
}
