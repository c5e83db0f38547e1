//! Render worker.
//!
//! This crate provides:
//! - Environment-driven worker configuration
//! - The render job pipeline from source probe to assembled output
//! - Error categorization for job results
//! - Structured job logging

pub mod config;
pub mod error;
pub mod job;
pub mod logging;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use job::RenderJob;
pub use logging::JobLogger;
