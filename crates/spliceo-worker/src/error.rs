//! Worker error types.

use std::time::Duration;

use spliceo_media::MediaError;
use spliceo_models::{EditMapError, ErrorCategory};
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Edit map error: {0}")]
    EditMap(#[from] EditMapError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Job timed out after {0:?}")]
    JobTimeout(Duration),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Category reported in a failed job result.
    pub fn category(&self) -> ErrorCategory {
        match self {
            WorkerError::InvalidInput(_) | WorkerError::EditMap(_) => ErrorCategory::Input,
            WorkerError::ConfigError(_) => ErrorCategory::Resource,
            WorkerError::JobTimeout(_) => ErrorCategory::Timeout,
            WorkerError::Io(_) => ErrorCategory::Internal,
            WorkerError::Media(e) => match e {
                MediaError::ToolNotFound(_) => ErrorCategory::Resource,
                MediaError::FileNotFound(_)
                | MediaError::InvalidVideo(_)
                | MediaError::FfprobeFailed { .. }
                | MediaError::JsonParse(_) => ErrorCategory::Input,
                MediaError::Timeout { .. } => ErrorCategory::Timeout,
                MediaError::DurationMismatch { .. } => ErrorCategory::Consistency,
                MediaError::FfmpegFailed { .. } | MediaError::NoSegmentsRendered { .. } => {
                    ErrorCategory::Execution
                }
                MediaError::Cancelled
                | MediaError::Io(_)
                | MediaError::InvalidPlan(_)
                | MediaError::Internal(_) => ErrorCategory::Internal,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            WorkerError::invalid_input("empty timeline").category(),
            ErrorCategory::Input
        );
        assert_eq!(
            WorkerError::from(MediaError::ToolNotFound("ffmpeg".into())).category(),
            ErrorCategory::Resource
        );
        assert_eq!(
            WorkerError::from(MediaError::NoSegmentsRendered { failed: 3 }).category(),
            ErrorCategory::Execution
        );
        assert_eq!(
            WorkerError::from(MediaError::DurationMismatch {
                expected: 10.0,
                actual: 8.0
            })
            .category(),
            ErrorCategory::Consistency
        );
        assert_eq!(
            WorkerError::JobTimeout(Duration::from_secs(5)).category(),
            ErrorCategory::Timeout
        );
    }
}
