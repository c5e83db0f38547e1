//! Job input and result payloads.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::encoding::QualityPreset;
use crate::resolution::OutputResolution;

/// Unique identifier for a render job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One render invocation. Paths are local; fetching and uploading happen
/// outside the worker.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobInput {
    #[serde(default)]
    pub id: JobId,
    pub source_path: PathBuf,
    /// Edit-map JSON document. Absent means "render the source as is".
    #[serde(default)]
    pub edit_map_path: Option<PathBuf>,
    pub output_path: PathBuf,
    #[serde(default)]
    pub output_resolution: OutputResolution,
    #[serde(default)]
    pub quality: QualityPreset,
    #[serde(default)]
    pub debug_overlay: bool,
    /// Paid users never get a watermark.
    #[serde(default)]
    pub paid_user: bool,
}

impl JobInput {
    pub fn new(source_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            id: JobId::new(),
            source_path: source_path.into(),
            edit_map_path: None,
            output_path: output_path.into(),
            output_resolution: OutputResolution::default(),
            quality: QualityPreset::default(),
            debug_overlay: false,
            paid_user: false,
        }
    }

    pub fn with_edit_map(mut self, path: impl Into<PathBuf>) -> Self {
        self.edit_map_path = Some(path.into());
        self
    }
}

/// Failure taxonomy reported in a failed [`JobResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid edit map or source file.
    Input,
    /// Missing tools, disk, hardware.
    Resource,
    /// External process failures.
    Execution,
    Timeout,
    /// Output duration diverged from the plan.
    Consistency,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Input => "input",
            ErrorCategory::Resource => "resource",
            ErrorCategory::Execution => "execution",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Consistency => "consistency",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics of a successful render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobStats {
    pub elapsed_secs: f64,
    pub output_size_bytes: u64,
    pub source_size_bytes: u64,
    pub source_duration_secs: f64,
    pub output_duration_secs: f64,
    pub segments_total: usize,
    pub segments_copied: usize,
    pub segments_encoded: usize,
    pub segments_failed: usize,
    pub hardware_fallbacks: usize,
    /// Output seconds rendered per wall-clock second.
    pub realtime_factor: f64,
}

impl JobStats {
    /// Output/source size ratio in percent.
    pub fn compression_pct(&self) -> f64 {
        if self.source_size_bytes == 0 {
            return 0.0;
        }
        self.output_size_bytes as f64 / self.source_size_bytes as f64 * 100.0
    }
}

/// Outcome of one job invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobResult {
    Success {
        job_id: JobId,
        output_path: PathBuf,
        /// Indices of segments dropped after exhausting fallback.
        failed_segments: Vec<usize>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
        stats: JobStats,
        completed_at: DateTime<Utc>,
    },
    Failure {
        job_id: JobId,
        category: ErrorCategory,
        message: String,
        completed_at: DateTime<Utc>,
    },
}

impl JobResult {
    pub fn failure(job_id: JobId, category: ErrorCategory, message: impl Into<String>) -> Self {
        JobResult::Failure {
            job_id,
            category,
            message: message.into(),
            completed_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Success { .. })
    }

    pub fn job_id(&self) -> &JobId {
        match self {
            JobResult::Success { job_id, .. } | JobResult::Failure { job_id, .. } => job_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_input_defaults() {
        let input: JobInput = serde_json::from_str(
            r#"{"source_path": "/tmp/in.mp4", "output_path": "/tmp/out.mp4"}"#,
        )
        .unwrap();
        assert_eq!(input.output_resolution, OutputResolution::Hd720);
        assert_eq!(input.quality, QualityPreset::Balanced);
        assert!(input.edit_map_path.is_none());
        assert!(!input.id.as_str().is_empty());
    }

    #[test]
    fn test_result_serialization() {
        let result = JobResult::failure(
            JobId::from_string("job-1"),
            ErrorCategory::Timeout,
            "job exceeded 600s",
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["category"], "timeout");
        assert_eq!(json["job_id"], "job-1");
        assert!(!result.is_success());
    }

    #[test]
    fn test_compression_pct() {
        let stats = JobStats {
            output_size_bytes: 25,
            source_size_bytes: 100,
            ..Default::default()
        };
        assert_eq!(stats.compression_pct(), 25.0);
        assert_eq!(JobStats::default().compression_pct(), 0.0);
    }
}
