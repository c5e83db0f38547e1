//! Playback speed changes.

use crate::filters::{AudioOp, FilterOp};

/// Range a single `atempo` stage accepts.
pub const ATEMPO_MIN: f64 = 0.5;
pub const ATEMPO_MAX: f64 = 2.0;

/// Video timestamp remap for `speed`, `None` at normal speed.
pub fn video_op(speed: f64) -> Option<FilterOp> {
    (speed != 1.0 && speed > 0.0).then_some(FilterOp::SetPts { speed })
}

/// Split `speed` into `atempo` stages inside `[0.5, 2.0]`.
///
/// Whole halvings/doublings come first; the remainder is one final stage,
/// skipped when it is exactly 1.0.
pub fn atempo_chain(speed: f64) -> Vec<AudioOp> {
    let mut ops = Vec::new();
    if !speed.is_finite() || speed <= 0.0 {
        return ops;
    }

    let mut remaining = speed;
    while remaining > ATEMPO_MAX {
        ops.push(AudioOp::Atempo(ATEMPO_MAX));
        remaining /= ATEMPO_MAX;
    }
    while remaining < ATEMPO_MIN {
        ops.push(AudioOp::Atempo(ATEMPO_MIN));
        remaining /= ATEMPO_MIN;
    }
    if remaining != 1.0 {
        ops.push(AudioOp::Atempo(remaining));
    }
    ops
}
