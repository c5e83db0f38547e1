//! FFmpeg command builder and process specs.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MediaError, MediaResult};

/// Lines of diagnostic output kept from a failed process.
pub const STDERR_TAIL_LINES: usize = 40;
/// Byte cap on the kept diagnostic output.
pub const STDERR_TAIL_BYTES: usize = 2000;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path (or lavfi source)
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            log_level: "error".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn input_arg(self, arg: impl Into<String>) -> Self {
        self.input_args([arg.into()])
    }

    /// Add output arguments (after -i).
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn output_arg(self, arg: impl Into<String>) -> Self {
        self.output_args([arg.into()])
    }

    /// Input seek, frame-accurate with re-encode, keyframe-aligned with copy.
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Limit how much of the input is read.
    pub fn duration(self, seconds: f64) -> Self {
        self.input_arg("-t").input_arg(format!("{:.3}", seconds))
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    pub fn audio_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-af").output_arg(filter)
    }

    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Stream copy for every mapped stream.
    pub fn codec_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    pub fn faststart(self) -> Self {
        self.output_arg("-movflags").output_arg("+faststart")
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-nostdin".to_string(),
            "-hide_banner".to_string(),
            "-v".to_string(),
            self.log_level.clone(),
            "-nostats".to_string(),
            // Progress key/value lines go to stderr alongside diagnostics.
            "-progress".to_string(),
            "pipe:2".to_string(),
        ];

        args.extend(self.input_args.iter().cloned());
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());
        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }

    /// Turn into an executable spec.
    pub fn into_spec(self, label: impl Into<String>, timeout: Option<Duration>) -> CommandSpec {
        CommandSpec {
            program: "ffmpeg".to_string(),
            args: self.build_args(),
            label: label.into(),
            timeout,
            expected_secs: None,
        }
    }
}

/// A fully formed external process invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Human label for logs (`segment 3 (cpu)`).
    pub label: String,
    /// Wall-clock limit; the whole process group is killed when exceeded.
    pub timeout: Option<Duration>,
    /// Expected output duration, for progress reporting.
    pub expected_secs: Option<f64>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let program = program.into();
        Self {
            label: program.clone(),
            program,
            args: args.into_iter().map(Into::into).collect(),
            timeout: None,
            expected_secs: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_expected_secs(mut self, secs: f64) -> Self {
        self.expected_secs = Some(secs);
        self
    }

    /// Shell-like rendering for debug logs.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains([' ', '\'', ';', '[']) {
                line.push('"');
                line.push_str(arg);
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }

    /// Value following `flag`, if present.
    pub fn arg_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

/// Outcome of a process that ran to completion.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// `None` when killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    /// Tail of non-progress stderr lines.
    pub stderr_tail: String,
    pub elapsed: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Map a non-zero exit to [`MediaError::FfmpegFailed`].
    pub fn into_result(self, message: impl Into<String>) -> MediaResult<Self> {
        if self.success() {
            return Ok(self);
        }
        let stderr = (!self.stderr_tail.is_empty()).then(|| self.stderr_tail.clone());
        Err(MediaError::ffmpeg_failed(message, stderr, self.exit_code))
    }
}

/// Bounded tail of diagnostic lines.
#[derive(Debug, Default)]
pub struct StderrTail {
    lines: VecDeque<String>,
}

impl StderrTail {
    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        if line.trim().is_empty() {
            return;
        }
        if self.lines.len() == STDERR_TAIL_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Joined tail, capped at [`STDERR_TAIL_BYTES`] from the end.
    pub fn finish(self) -> String {
        let joined = Vec::from(self.lines).join("\n");
        if joined.len() <= STDERR_TAIL_BYTES {
            return joined;
        }
        let mut cut = joined.len() - STDERR_TAIL_BYTES;
        while !joined.is_char_boundary(cut) {
            cut += 1;
        }
        joined[cut..].to_string()
    }
}

/// Check if a tool is available.
pub fn check_tool(name: &str) -> MediaResult<PathBuf> {
    which::which(name).map_err(|_| MediaError::ToolNotFound(name.to_string()))
}
