//! Structured job logging.
//!
//! Every record carries the job ID and the pipeline stage so a render can be
//! followed across segment workers in JSON logs.

use tracing::{error, info, warn, Span};
use spliceo_models::JobId;

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a logger for `job_id` at pipeline stage `operation`
    /// (e.g. "probe", "render", "assemble").
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Same job, different stage.
    pub fn with_operation(&self, operation: &str) -> Self {
        Self {
            job_id: self.job_id.clone(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span wrapping the whole job, so segment-level events inherit the job ID.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id)
    }
}
