//! Edit-map document parsing.
//!
//! The document is `{ "edits": [...], "subtitles": [...] }`. A document that
//! is not an object (or whose collections are not arrays) is rejected as a
//! whole. Individual entries are parsed independently: a malformed entry is
//! skipped and recorded, never fatal.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::edit::{Edit, EditKind, ZoomFactor};
use crate::subtitle::{Subtitle, SubtitleStyle};

/// Document-level edit-map failures.
#[derive(Debug, Error)]
pub enum EditMapError {
    #[error("edit map is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("edit map must be a JSON object")]
    NotAnObject,

    #[error("edit map member `{0}` must be an array")]
    NotAnArray(&'static str),
}

/// Which collection a skipped entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryCollection {
    Edits,
    Subtitles,
}

/// An entry dropped during parsing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEntry {
    pub collection: EntryCollection,
    pub index: usize,
    pub reason: String,
}

/// Parsed edit map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EditMap {
    pub edits: Vec<Edit>,
    pub subtitles: Vec<Subtitle>,
    pub skipped: Vec<SkippedEntry>,
}

impl EditMap {
    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, EditMapError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Parse an already-decoded JSON document.
    pub fn from_value(value: &Value) -> Result<Self, EditMapError> {
        let obj = value.as_object().ok_or(EditMapError::NotAnObject)?;
        let edit_entries = collection(obj, "edits")?;
        let subtitle_entries = collection(obj, "subtitles")?;

        let mut map = EditMap::default();

        for (index, entry) in edit_entries.iter().enumerate() {
            match parse_edit(entry, index) {
                Ok(edit) => map.edits.push(edit),
                Err(reason) => {
                    warn!(index, reason = %reason, "Skipping malformed edit");
                    map.skipped.push(SkippedEntry {
                        collection: EntryCollection::Edits,
                        index,
                        reason,
                    });
                }
            }
        }

        for (index, entry) in subtitle_entries.iter().enumerate() {
            match parse_subtitle(entry, index) {
                Ok(sub) => map.subtitles.push(sub),
                Err(reason) => {
                    warn!(index, reason = %reason, "Skipping malformed subtitle");
                    map.skipped.push(SkippedEntry {
                        collection: EntryCollection::Subtitles,
                        index,
                        reason,
                    });
                }
            }
        }

        Ok(map)
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && self.subtitles.is_empty()
    }
}

fn collection<'a>(
    obj: &'a serde_json::Map<String, Value>,
    key: &'static str,
) -> Result<&'a [Value], EditMapError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(EditMapError::NotAnArray(key)),
    }
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberLike {
        Number(f64),
        Text(String),
    }

    match NumberLike::deserialize(deserializer)? {
        NumberLike::Number(n) => Ok(n),
        NumberLike::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("not a number: {s:?}"))),
    }
}

fn one() -> f64 {
    1.0
}
fn half() -> f64 {
    0.5
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEdit {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default, deserialize_with = "lenient_f64")]
    start: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    end: f64,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default = "one", deserialize_with = "lenient_f64")]
    speed: f64,
    #[serde(default)]
    zoom: Option<ZoomFactor>,
    #[serde(default = "half", deserialize_with = "lenient_f64")]
    anchor_x: f64,
    #[serde(default = "half", deserialize_with = "lenient_f64")]
    anchor_y: f64,
    #[serde(default)]
    is_locked: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSubtitle {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    text: Option<Value>,
    #[serde(default, deserialize_with = "lenient_f64")]
    start: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    end: f64,
    #[serde(default)]
    style: Option<SubtitleStyle>,
    #[serde(default)]
    is_locked: bool,
}

fn id_string(id: Option<Value>, prefix: &str, index: usize) -> String {
    match id {
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => format!("{prefix}-{index}"),
    }
}

fn check_range(start: f64, end: f64) -> Result<(), String> {
    if !start.is_finite() || !end.is_finite() {
        return Err("start/end must be finite".to_string());
    }
    if end <= start {
        return Err(format!("end ({end}) must be greater than start ({start})"));
    }
    Ok(())
}

fn parse_edit(entry: &Value, index: usize) -> Result<Edit, String> {
    let raw = RawEdit::deserialize(entry).map_err(|e| e.to_string())?;
    check_range(raw.start, raw.end)?;

    if !raw.speed.is_finite() || raw.speed <= 0.0 {
        return Err(format!("speed must be positive, got {}", raw.speed));
    }
    let zoom = raw.zoom.unwrap_or_default();
    if let ZoomFactor::Factor(f) = zoom {
        if !f.is_finite() || f <= 0.0 {
            return Err(format!("zoom must be positive, got {f}"));
        }
    }
    if !raw.anchor_x.is_finite() || !raw.anchor_y.is_finite() {
        return Err("anchor must be finite".to_string());
    }

    let kind = raw
        .kind
        .as_deref()
        .map(EditKind::from_type_str)
        .unwrap_or_default();

    Ok(Edit {
        id: id_string(raw.id, "edit", index),
        start: raw.start,
        end: raw.end,
        kind,
        speed_factor: raw.speed,
        zoom,
        anchor_x: raw.anchor_x.clamp(0.0, 1.0),
        anchor_y: raw.anchor_y.clamp(0.0, 1.0),
        locked: raw.is_locked,
    })
}

fn parse_subtitle(entry: &Value, index: usize) -> Result<Subtitle, String> {
    let raw = RawSubtitle::deserialize(entry).map_err(|e| e.to_string())?;
    check_range(raw.start, raw.end)?;

    let text = match raw.text {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    };
    if text.trim().is_empty() {
        return Err("subtitle text is empty".to_string());
    }

    Ok(Subtitle {
        id: id_string(raw.id, "subtitle", index),
        text,
        start: raw.start,
        end: raw.end,
        style: raw.style.unwrap_or_default(),
        locked: raw.is_locked,
    })
}
