//! Shared data models for the Spliceo render pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Edits, subtitles and the edit-map document
//! - Timeline segments
//! - Output resolutions and encoding presets
//! - Job input and result payloads

pub mod edit;
pub mod edit_map;
pub mod encoding;
pub mod job;
pub mod resolution;
pub mod segment;
pub mod subtitle;

// Re-export common types
pub use edit::{Edit, EditKind, ZoomFactor};
pub use edit_map::{EditMap, EditMapError, EntryCollection, SkippedEntry};
pub use encoding::{EncodingConfig, NvencTuning, PresetSettings, QualityPreset};
pub use job::{ErrorCategory, JobId, JobInput, JobResult, JobStats};
pub use resolution::{OutputResolution, Resolution};
pub use segment::Segment;
pub use subtitle::{CaptionPosition, Subtitle, SubtitleStyle, TextAlign};
