//! External process execution.
//!
//! Everything that shells out (ffmpeg, ffprobe, nvidia-smi) goes through
//! [`CommandExecutor`], so the orchestrator and assembler can be driven by
//! scripted executors in tests.

use async_trait::async_trait;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, trace, warn};

use crate::command::{CommandOutput, CommandSpec, StderrTail};
use crate::error::{MediaError, MediaResult};
use crate::progress::{is_progress_line, parse_progress_line, FfmpegProgress};

/// How long to wait for a killed process's stderr pipe to close.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Runs a [`CommandSpec`] to completion.
///
/// Returns `Ok` for any process that exited (check [`CommandOutput::success`]),
/// [`MediaError::Timeout`] when the command's limit was hit, and other errors when
/// the process could not be started.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, spec: &CommandSpec) -> MediaResult<CommandOutput>;
}

/// Executes real child processes, each in its own process group.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(&self, spec: &CommandSpec) -> MediaResult<CommandOutput> {
        which::which(&spec.program).map_err(|_| MediaError::ToolNotFound(spec.program.clone()))?;
        debug!(label = %spec.label, "Running: {}", spec.command_line());

        let started = Instant::now();
        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()?;

        // Armed until the child is reaped, so a dropped future (job abort)
        // still takes down ffmpeg and anything it spawned.
        let mut group = ProcessGroupGuard::new(child.id());

        let stdout_task = child.stdout.take().map(|mut out| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = out.read_to_end(&mut buf).await;
                buf
            })
        });

        let label = spec.label.clone();
        let expected_secs = spec.expected_secs.unwrap_or(0.0);
        let stderr_task = child.stderr.take().map(|err| {
            tokio::spawn(async move {
                let mut tail = StderrTail::default();
                let mut progress = FfmpegProgress::default();
                let mut lines = BufReader::new(err).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(snapshot) = parse_progress_line(&line, &mut progress) {
                        trace!(
                            label = %label,
                            frame = snapshot.frame,
                            percent = snapshot.percentage(expected_secs),
                            eta_secs = ?snapshot.eta_seconds(expected_secs),
                            speed = snapshot.speed,
                            "progress"
                        );
                    } else if !is_progress_line(&line) {
                        tail.push(line);
                    }
                }
                tail.finish()
            })
        });

        let status = match spec.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!(
                        label = %spec.label,
                        timeout_secs = limit.as_secs_f64(),
                        "Process timed out, killing process group"
                    );
                    group.kill();
                    let _ = child.kill().await;
                    let mut err = MediaError::timeout(&spec.label, limit.as_secs_f64());
                    if let Some(task) = stderr_task {
                        // The pipe closes once the whole group is dead.
                        match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, task).await {
                            Ok(Ok(tail)) => err = err.with_stderr(tail),
                            Ok(Err(e)) => debug!(error = %e, "stderr reader failed"),
                            Err(_) => debug!(label = %spec.label, "stderr still open after kill"),
                        }
                    }
                    return Err(err);
                }
            },
            None => child.wait().await?,
        };
        group.disarm();

        let stdout = match stdout_task {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };
        let stderr_tail = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        Ok(CommandOutput {
            exit_code: status.code(),
            stdout,
            stderr_tail,
            elapsed: started.elapsed(),
        })
    }
}

/// Sends SIGKILL to a child's process group unless disarmed.
#[derive(Debug)]
struct ProcessGroupGuard {
    pgid: Option<Pid>,
}

impl ProcessGroupGuard {
    /// The child was started with `process_group(0)`, so its pid is the pgid.
    fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.and_then(|p| i32::try_from(p).ok()).map(Pid::from_raw),
        }
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            if let Err(e) = killpg(pgid, Signal::SIGKILL) {
                debug!(pgid = pgid.as_raw(), error = %e, "killpg failed");
            }
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_execute_captures_exit_and_stderr() {
        let spec = CommandSpec::new("sh", ["-c", "echo out; echo 'frame=12' >&2; echo boom >&2; exit 3"]);
        let output = ProcessExecutor::new().execute(&spec).await.unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout_text().trim(), "out");
        assert_eq!(output.stderr_tail, "boom");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_execute_timeout_kills_group() {
        let spec = CommandSpec::new("sh", ["-c", "sleep 30 & sleep 30; wait"])
            .with_label("sleeper")
            .with_timeout(Duration::from_millis(200));
        let started = Instant::now();
        let err = ProcessExecutor::new().execute(&spec).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_execute_timeout_keeps_stderr_tail() {
        let spec = CommandSpec::new(
            "sh",
            ["-c", "echo 'nvenc init failed: out of memory' >&2; sleep 30"],
        )
        .with_label("seg")
        .with_timeout(Duration::from_millis(300));
        let err = ProcessExecutor::new().execute(&spec).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.stderr_tail(), Some("nvenc init failed: out of memory"));
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let spec = CommandSpec::new("definitely-not-a-real-tool-xyz", Vec::<String>::new());
        let err = ProcessExecutor::new().execute(&spec).await.unwrap_err();
        assert!(matches!(err, MediaError::ToolNotFound(_)));
    }
}
