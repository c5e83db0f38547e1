//! Timeline segments.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::edit::Edit;
use crate::subtitle::Subtitle;

/// A maximal sub-interval `[start, end)` of the source timeline sharing one
/// processing treatment.
///
/// Created by the timeline builder, annotated once by the classifier
/// (`can_copy` / `needs_processing`), then read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Position in the output timeline (0-based, dense).
    pub index: usize,
    pub start: f64,
    pub end: f64,
    /// Owning non-cut edit; `None` means original footage.
    pub edit: Option<Edit>,
    /// Captions whose interval overlaps `[start, end)`.
    pub subtitles: Vec<Subtitle>,
    pub is_original: bool,
    pub can_copy: bool,
    pub needs_processing: bool,
}

impl Segment {
    /// New unclassified segment. Unclassified segments need processing.
    pub fn new(index: usize, start: f64, end: f64, edit: Option<Edit>) -> Self {
        let is_original = edit.is_none();
        Self {
            index,
            start,
            end,
            edit,
            subtitles: Vec::new(),
            is_original,
            can_copy: false,
            needs_processing: true,
        }
    }

    pub fn with_subtitles(mut self, subtitles: Vec<Subtitle>) -> Self {
        self.subtitles = subtitles;
        self
    }

    /// Source-timeline duration.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Playback speed applied to this segment (1.0 for original footage).
    pub fn speed_factor(&self) -> f64 {
        self.edit.as_ref().map(|e| e.speed_factor).unwrap_or(1.0)
    }

    /// Duration of the rendered segment once speed is applied.
    pub fn output_duration(&self) -> f64 {
        let speed = self.speed_factor();
        if speed > 0.0 {
            self.duration() / speed
        } else {
            self.duration()
        }
    }

    pub fn has_subtitles(&self) -> bool {
        !self.subtitles.is_empty()
    }

    /// Short label for logs: `#3 [5.000, 8.000)`.
    pub fn label(&self) -> String {
        format!("#{} [{:.3}, {:.3})", self.index, self.start, self.end)
    }
}
