//! Per-segment visual and timing effects, expressed as typed filter ops.

pub mod caption;
pub mod speed;
pub mod zoom;

pub use caption::{debug_overlay_op, subtitle_ops};
pub use speed::atempo_chain;
