//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during planning, rendering and assembly.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} not found in PATH")]
    ToolNotFound(String),

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        /// Tail of the tool's diagnostic output.
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{label} timed out after {secs:.1} seconds")]
    Timeout {
        label: String,
        secs: f64,
        /// Diagnostic output the process wrote before it was killed.
        stderr: Option<String>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Invalid render plan: {0}")]
    InvalidPlan(String),

    #[error("No segments rendered ({failed} failed)")]
    NoSegmentsRendered { failed: usize },

    #[error("Duration mismatch: expected {expected:.3}s, got {actual:.3}s")]
    DurationMismatch { expected: f64, actual: f64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn timeout(label: impl Into<String>, secs: f64) -> Self {
        Self::Timeout {
            label: label.into(),
            secs,
            stderr: None,
        }
    }

    /// Attach the killed process's diagnostic tail to a timeout.
    pub fn with_stderr(self, tail: impl Into<String>) -> Self {
        let tail = tail.into();
        match self {
            Self::Timeout { label, secs, .. } if !tail.is_empty() => Self::Timeout {
                label,
                secs,
                stderr: Some(tail),
            },
            other => other,
        }
    }

    pub fn invalid_plan(message: impl Into<String>) -> Self {
        Self::InvalidPlan(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, MediaError::Timeout { .. })
    }

    /// Diagnostic tail of a failed external process, if any.
    pub fn stderr_tail(&self) -> Option<&str> {
        match self {
            MediaError::FfmpegFailed { stderr, .. }
            | MediaError::FfprobeFailed { stderr, .. }
            | MediaError::Timeout { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}
