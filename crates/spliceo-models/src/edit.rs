//! Authored edits on the source timeline.

use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Kind of an authored edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    /// Removes the range from the output entirely.
    Cut,
    /// Crop-and-rescale around an anchor point.
    #[default]
    Zoom,
    /// Playback speed change.
    Speed,
    /// Any other tagged range (carries speed/zoom parameters only).
    Generic,
}

impl EditKind {
    /// Map the edit-map `type` string onto a kind. Unknown strings are `Generic`.
    pub fn from_type_str(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "cut" => EditKind::Cut,
            "zoom" => EditKind::Zoom,
            "speed" => EditKind::Speed,
            _ => EditKind::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EditKind::Cut => "cut",
            EditKind::Zoom => "zoom",
            EditKind::Speed => "speed",
            EditKind::Generic => "generic",
        }
    }
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Zoom level of an edit: either the `"none"` sentinel or a numeric factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomFactor {
    None,
    Factor(f64),
}

impl Default for ZoomFactor {
    fn default() -> Self {
        ZoomFactor::Factor(1.0)
    }
}

impl ZoomFactor {
    /// `true` for the sentinel and for exactly 1.0.
    pub fn is_identity(&self) -> bool {
        match self {
            ZoomFactor::None => true,
            ZoomFactor::Factor(f) => *f == 1.0,
        }
    }

    /// `true` when the factor actually magnifies the frame (> 1.0).
    pub fn is_active(&self) -> bool {
        matches!(self, ZoomFactor::Factor(f) if *f > 1.0)
    }

    /// Numeric factor, if any.
    pub fn value(&self) -> Option<f64> {
        match self {
            ZoomFactor::None => None,
            ZoomFactor::Factor(f) => Some(*f),
        }
    }
}

impl Serialize for ZoomFactor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ZoomFactor::None => serializer.serialize_str("none"),
            ZoomFactor::Factor(f) => serializer.serialize_f64(*f),
        }
    }
}

impl<'de> Deserialize<'de> for ZoomFactor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawZoom {
            Number(f64),
            Text(String),
        }

        match RawZoom::deserialize(deserializer)? {
            RawZoom::Number(f) => Ok(ZoomFactor::Factor(f)),
            RawZoom::Text(s) => {
                let s = s.trim();
                if s.eq_ignore_ascii_case("none") {
                    Ok(ZoomFactor::None)
                } else {
                    s.parse::<f64>()
                        .map(ZoomFactor::Factor)
                        .map_err(|_| D::Error::custom(format!("invalid zoom value: {s:?}")))
                }
            }
        }
    }
}

impl JsonSchema for ZoomFactor {
    fn schema_name() -> String {
        "ZoomFactor".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        <serde_json::Value as JsonSchema>::json_schema(gen)
    }
}

/// One authored modification of the timeline. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Edit {
    pub id: String,
    /// Start in seconds on the source timeline.
    pub start: f64,
    /// End in seconds, always greater than `start`.
    pub end: f64,
    #[serde(rename = "type")]
    pub kind: EditKind,
    /// Playback speed multiplier (> 0).
    #[serde(rename = "speed")]
    pub speed_factor: f64,
    pub zoom: ZoomFactor,
    /// Horizontal zoom anchor as a fraction of the frame width.
    pub anchor_x: f64,
    /// Vertical zoom anchor as a fraction of the frame height.
    pub anchor_y: f64,
    #[serde(rename = "isLocked")]
    pub locked: bool,
}

impl Edit {
    /// Create an edit with neutral effect parameters.
    pub fn new(id: impl Into<String>, kind: EditKind, start: f64, end: f64) -> Self {
        Self {
            id: id.into(),
            start,
            end,
            kind,
            speed_factor: 1.0,
            zoom: ZoomFactor::default(),
            anchor_x: 0.5,
            anchor_y: 0.5,
            locked: false,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed_factor = speed;
        self
    }

    pub fn with_zoom(mut self, zoom: ZoomFactor) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_anchor(mut self, x: f64, y: f64) -> Self {
        self.anchor_x = x.clamp(0.0, 1.0);
        self.anchor_y = y.clamp(0.0, 1.0);
        self
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_cut(&self) -> bool {
        self.kind == EditKind::Cut
    }

    /// `true` if the instant lies in `[start, end)`.
    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t < self.end
    }

    pub fn has_speed_change(&self) -> bool {
        self.speed_factor != 1.0
    }

    /// Whether the edit alters pixels or timing, independent of anything else
    /// attached to the segment.
    pub fn forces_processing(&self) -> bool {
        self.has_speed_change() || !self.zoom.is_identity()
    }
}
