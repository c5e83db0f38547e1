//! Render metrics.
//!
//! Only records through the `metrics` facade; the embedding process decides
//! whether a recorder is installed.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const SEGMENTS_RENDERED_TOTAL: &str = "spliceo_segments_rendered_total";
    pub const SEGMENTS_FAILED_TOTAL: &str = "spliceo_segments_failed_total";
    pub const HW_FALLBACKS_TOTAL: &str = "spliceo_hw_fallbacks_total";
    pub const SEGMENT_RENDER_SECONDS: &str = "spliceo_segment_render_seconds";
    pub const ASSEMBLY_SECONDS: &str = "spliceo_assembly_seconds";
    pub const DURATION_MISMATCH_TOTAL: &str = "spliceo_duration_mismatch_total";
}

/// Record a rendered segment and its wall time, by domain path.
pub fn record_segment_rendered(path: &str, duration_secs: f64) {
    let labels = [("path", path.to_string())];
    counter!(names::SEGMENTS_RENDERED_TOTAL, &labels).increment(1);
    histogram!(names::SEGMENT_RENDER_SECONDS, &labels).record(duration_secs);
}

/// Record a segment that was given up on.
pub fn record_segment_failed(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::SEGMENTS_FAILED_TOTAL, &labels).increment(1);
}

/// Record a hardware encode retried on the CPU.
pub fn record_hw_fallback() {
    counter!(names::HW_FALLBACKS_TOTAL).increment(1);
}

pub fn record_assembly(segments: usize, duration_secs: f64) {
    let labels = [("mode", if segments == 1 { "move" } else { "concat" }.to_string())];
    histogram!(names::ASSEMBLY_SECONDS, &labels).record(duration_secs);
}

pub fn record_duration_mismatch() {
    counter!(names::DURATION_MISMATCH_TOTAL).increment(1);
}
