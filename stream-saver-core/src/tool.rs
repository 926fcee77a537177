//! External tool invocation
//!
//! The capture tool (streamlink) and the remux tool (ffmpeg) are black boxes
//! reached through [`ExternalTool`]: run with arguments, wait for the exit,
//! get the status and the tail of its output back.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::error::{Error, Result};

/// Lines of stdout/stderr kept per run
pub const OUTPUT_TAIL_LINES: usize = 20;

/// Result of one tool run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }

    /// Short human readable reason for a failed run
    #[must_use]
    pub fn failure_reason(&self) -> String {
        let status = self
            .exit_code
            .map_or_else(|| "terminated by signal".to_string(), |code| format!("exit code {code}"));
        match self.stderr.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(last) => format!("{status}: {}", last.trim()),
            None => status,
        }
    }
}

/// A program run to completion with arguments
#[async_trait]
pub trait ExternalTool: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Run the tool and wait for it to exit.
    ///
    /// `Err` only when the tool could not be started at all; a non-zero exit
    /// is an `Ok` with [`ToolOutput::success`] false.
    async fn run(&self, args: &[OsString]) -> Result<ToolOutput>;
}

/// [`ExternalTool`] spawning a real child process
#[derive(Debug, Clone)]
pub struct ProcessTool {
    name: String,
    program: PathBuf,
    show_output: bool,
}

impl ProcessTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let name = program
            .file_stem()
            .map_or_else(|| program.display().to_string(), |s| s.to_string_lossy().into_owned());
        Self {
            name,
            program,
            show_output: false,
        }
    }

    /// Log the tool's output at `info` instead of `debug`.
    #[must_use]
    pub fn show_output(mut self, show: bool) -> Self {
        self.show_output = show;
        self
    }
}

#[async_trait]
impl ExternalTool for ProcessTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, args: &[OsString]) -> Result<ToolOutput> {
        tracing::debug!(tool = %self.name, program = %self.program.display(), "Spawning external tool");

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Tool(format!("failed to start {}: {e}", self.program.display())))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Drain both pipes while waiting so the child never blocks on a full pipe.
        let (stdout, stderr, status) = tokio::join!(
            collect_tail(stdout, &self.name, "stdout", self.show_output),
            collect_tail(stderr, &self.name, "stderr", self.show_output),
            child.wait(),
        );
        let status = status?;

        tracing::debug!(tool = %self.name, exit_code = ?status.code(), "External tool exited");

        Ok(ToolOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }
}

/// Forward every line to the log, keep the last [`OUTPUT_TAIL_LINES`].
async fn collect_tail<R>(pipe: Option<R>, tool: &str, stream: &'static str, show: bool) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(pipe) = pipe else {
        return String::new();
    };

    let mut tail = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
    let mut lines = BufReader::new(pipe).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if show {
                    tracing::info!(tool, stream, "{line}");
                } else {
                    tracing::debug!(tool, stream, "{line}");
                }
                if tail.len() == OUTPUT_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(tool, stream, error = %e, "Stopped reading tool output");
                break;
            }
        }
    }

    Vec::from(tail).join("\n")
}
