//! Timeline segmentation and copy classification.

mod builder;
mod classify;

pub use builder::{build_timeline, Timeline, EPSILON};
pub use classify::{classify, classify_timeline, Classification, ClassifyOptions};
