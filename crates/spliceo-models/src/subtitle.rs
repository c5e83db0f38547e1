//! Captions and their burn-in style.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Default caption position (percent of frame): bottom centre.
pub const DEFAULT_CAPTION_X_PCT: f64 = 50.0;
pub const DEFAULT_CAPTION_Y_PCT: f64 = 85.0;
pub const DEFAULT_FONT_SIZE: f64 = 38.0;
pub const DEFAULT_STROKE_WIDTH: f64 = 5.0;
pub const DEFAULT_FILL_COLOR: &str = "#FFFFFF";
pub const DEFAULT_STROKE_COLOR: &str = "#000000";

/// Horizontal text alignment of a caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

impl<'de> Deserialize<'de> for TextAlign {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "center" | "centre" => TextAlign::Center,
            "right" => TextAlign::Right,
            // Anything else renders left-aligned at the x offset.
            _ => TextAlign::Left,
        })
    }
}

/// Caption anchor in percent of the frame (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionPosition {
    #[serde(default = "default_x")]
    pub x: f64,
    #[serde(default = "default_y")]
    pub y: f64,
}

fn default_x() -> f64 {
    DEFAULT_CAPTION_X_PCT
}
fn default_y() -> f64 {
    DEFAULT_CAPTION_Y_PCT
}

impl Default for CaptionPosition {
    fn default() -> Self {
        Self {
            x: DEFAULT_CAPTION_X_PCT,
            y: DEFAULT_CAPTION_Y_PCT,
        }
    }
}

/// Burn-in style of a caption. Every field is optional in the edit map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleStyle {
    #[serde(default)]
    pub position: CaptionPosition,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    #[serde(default = "default_stroke_color")]
    pub stroke_color: String,
    /// Fill colour as `#RRGGBB`.
    #[serde(default = "default_fill_color")]
    pub color: String,
    #[serde(default)]
    pub text_align: TextAlign,
}

fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}
fn default_stroke_width() -> f64 {
    DEFAULT_STROKE_WIDTH
}
fn default_stroke_color() -> String {
    DEFAULT_STROKE_COLOR.to_string()
}
fn default_fill_color() -> String {
    DEFAULT_FILL_COLOR.to_string()
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            position: CaptionPosition::default(),
            font_size: DEFAULT_FONT_SIZE,
            stroke_width: DEFAULT_STROKE_WIDTH,
            stroke_color: DEFAULT_STROKE_COLOR.to_string(),
            color: DEFAULT_FILL_COLOR.to_string(),
            text_align: TextAlign::Center,
        }
    }
}

impl SubtitleStyle {
    /// Fill colour as upper-case `RRGGBB`, falling back to white on garbage.
    pub fn fill_hex(&self) -> String {
        normalize_hex(&self.color).unwrap_or_else(|| "FFFFFF".to_string())
    }

    /// Stroke colour as upper-case `RRGGBB`, falling back to black on garbage.
    pub fn stroke_hex(&self) -> String {
        normalize_hex(&self.stroke_color).unwrap_or_else(|| "000000".to_string())
    }
}

/// Accepts `#RRGGBB`, `RRGGBB` or `#RGB`.
fn normalize_hex(color: &str) -> Option<String> {
    let hex = color.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => Some(hex.to_ascii_uppercase()),
        3 => Some(
            hex.chars()
                .flat_map(|c| [c, c])
                .collect::<String>()
                .to_ascii_uppercase(),
        ),
        _ => None,
    }
}

/// One caption. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subtitle {
    pub id: String,
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub style: SubtitleStyle,
    #[serde(rename = "isLocked", default)]
    pub locked: bool,
}

impl Subtitle {
    pub fn new(id: impl Into<String>, text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            start,
            end,
            style: SubtitleStyle::default(),
            locked: false,
        }
    }

    pub fn with_style(mut self, style: SubtitleStyle) -> Self {
        self.style = style;
        self
    }

    /// Overlap test against `[a, b)`: excluded only when it ends at or before
    /// `a` or starts at or after `b`.
    pub fn overlaps(&self, a: f64, b: f64) -> bool {
        !(self.end <= a || self.start >= b)
    }
}
