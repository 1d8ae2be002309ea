//! Long-running encodes with streamed progress and cancellation.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use ef_command::split_command_line;
use ef_core::{Error, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::tools::{ToolRegistry, FFMPEG};

/// Lines of stderr kept for failure reports.
const STDERR_TAIL_LINES: usize = 40;

/// Flags that make ffmpeg report machine-readable progress on stdout.
const PROGRESS_ARGS: [&str; 4] = ["-hide_banner", "-nostats", "-progress", "pipe:1"];

/// One external-process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    /// Flat quoted argument string, without the program name.
    pub command: String,
    pub working_dir: Option<PathBuf>,
}

impl ProcessRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// How a finished process exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    /// Tail of standard error.
    pub stderr: String,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes synthesized commands.
///
/// Progress text is delivered in chunks on `progress` while the process
/// runs; the sender is dropped when the run ends. Cancelling `cancel`
/// must stop the process and yield [`Error::Cancelled`]; cancelling an
/// already finished run has no effect.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        request: ProcessRequest,
        progress: mpsc::UnboundedSender<String>,
        cancel: CancellationToken,
    ) -> Result<ProcessOutcome>;
}

/// [`ProcessRunner`] spawning ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    ffmpeg_path: PathBuf,
}

impl FfmpegRunner {
    pub fn new(ffmpeg_path: PathBuf) -> Self {
        Self { ffmpeg_path }
    }

    pub fn from_registry(tools: &ToolRegistry) -> Result<Self> {
        Ok(Self::new(tools.require(FFMPEG)?.path.clone()))
    }

    fn spawn(&self, request: &ProcessRequest) -> Result<Child> {
        let user_args = split_command_line(&request.command)?;

        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(PROGRESS_ARGS)
            .args(&user_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = request.working_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(command = %request.command, "Spawning ffmpeg");
        cmd.spawn()
            .map_err(|e| Error::tool(FFMPEG, format!("failed to spawn: {e}")))
    }
}

/// Keep only the last [`STDERR_TAIL_LINES`] lines of a stream.
async fn collect_tail(stream: impl AsyncRead + Unpin) -> String {
    let mut lines = BufReader::new(stream).lines();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    while let Ok(Some(line)) = lines.next_line().await {
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Vec::from(tail).join("\n")
}

/// Forward `key=value` progress blocks, each terminated by a
/// `progress=continue|end` line.
async fn forward_progress(stream: impl AsyncRead + Unpin, progress: mpsc::UnboundedSender<String>) {
    let mut lines = BufReader::new(stream).lines();
    let mut block = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        let done = line.starts_with("progress=");
        block.push_str(&line);
        block.push('\n');
        if done {
            // A closed receiver is fine; keep draining so the pipe never fills.
            let _ = progress.send(std::mem::take(&mut block));
        }
    }
    if !block.is_empty() {
        let _ = progress.send(block);
    }
}

#[async_trait]
impl ProcessRunner for FfmpegRunner {
    async fn run(
        &self,
        request: ProcessRequest,
        progress: mpsc::UnboundedSender<String>,
        cancel: CancellationToken,
    ) -> Result<ProcessOutcome> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut child = self.spawn(&request)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::tool(FFMPEG, "stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::tool(FFMPEG, "stderr not captured"))?;
        let progress_task = tokio::spawn(forward_progress(stdout, progress));
        let stderr_task = tokio::spawn(collect_tail(stderr));

        let status = tokio::select! {
            status = child.wait() => status.map_err(|e| Error::tool(FFMPEG, format!("wait failed: {e}")))?,
            _ = cancel.cancelled() => {
                // start_kill fails only when the child already exited.
                if let Err(e) = child.start_kill() {
                    tracing::debug!(error = %e, "ffmpeg already exited");
                }
                let _ = child.wait().await;
                progress_task.abort();
                stderr_task.abort();
                tracing::info!("ffmpeg cancelled");
                return Err(Error::Cancelled);
            }
        };

        let _ = progress_task.await;
        let stderr = stderr_task.await.unwrap_or_default();
        let exit_code = status.code().unwrap_or(-1);
        if exit_code != 0 {
            tracing::warn!(exit_code, "ffmpeg failed");
        }
        Ok(ProcessOutcome { exit_code, stderr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn progress_blocks_are_split_on_progress_lines() {
        let text: &[u8] = b"frame=10\nfps=24.0\nprogress=continue\nframe=20\nprogress=end\n";
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_progress(text, tx).await;

        assert_eq!(rx.recv().await.unwrap(), "frame=10\nfps=24.0\nprogress=continue\n");
        assert_eq!(rx.recv().await.unwrap(), "frame=20\nprogress=end\n");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn trailing_partial_block_is_flushed() {
        let text: &[u8] = b"frame=5\nout_time=00:00:01.000000\n";
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_progress(text, tx).await;
        assert_eq!(rx.recv().await.unwrap(), "frame=5\nout_time=00:00:01.000000\n");
    }

    #[tokio::test]
    async fn stderr_tail_is_bounded() {
        let text: String = (0..100).map(|i| format!("line {i}\n")).collect();
        let tail = collect_tail(text.as_bytes()).await;
        let lines: Vec<&str> = tail.lines().collect();
        assert_eq!(lines.len(), STDERR_TAIL_LINES);
        assert_eq!(lines.last().copied(), Some("line 99"));
    }

    #[tokio::test]
    async fn missing_binary_is_tool_error() {
        let runner = FfmpegRunner::new(PathBuf::from("/nonexistent/ffmpeg"));
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = runner
            .run(ProcessRequest::new("-i in.mkv out.mp4"), tx, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Tool { .. }));
    }

    #[tokio::test]
    async fn pre_cancelled_run_never_spawns() {
        let runner = FfmpegRunner::new(PathBuf::from("/nonexistent/ffmpeg"));
        let (tx, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = runner
            .run(ProcessRequest::new("-i a b"), tx, cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn malformed_command_is_validation_error() {
        let runner = FfmpegRunner::new(PathBuf::from("/nonexistent/ffmpeg"));
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = runner
            .run(ProcessRequest::new("-i \"unterminated"), tx, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
