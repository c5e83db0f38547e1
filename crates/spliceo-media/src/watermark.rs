//! Watermark overlay for free-tier renders.
//!
//! The image is read by a `movie=` source inside each segment's filtergraph,
//! so the watermark costs no extra encode pass.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use spliceo_models::Resolution;

use crate::filters::{FilterOp, ImageOverlay};

/// Corner the watermark is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    #[default]
    BottomLeft,
    BottomRight,
}

impl FromStr for WatermarkPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "top_left" => Ok(Self::TopLeft),
            "top_right" => Ok(Self::TopRight),
            "bottom_left" => Ok(Self::BottomLeft),
            "bottom_right" => Ok(Self::BottomRight),
            other => Err(format!("unknown watermark position: {other}")),
        }
    }
}

/// Configuration for watermark overlay.
///
/// ```ignore
/// let config = WatermarkConfig::new("/app/assets/watermark.png")
///     .with_position(WatermarkPosition::BottomRight)
///     .with_opacity(0.8);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkConfig {
    /// Path to watermark image (PNG with transparency)
    pub image_path: PathBuf,
    /// Watermark width as a fraction of the output width
    pub scale: f64,
    /// Opacity (0.0 to 1.0)
    pub opacity: f32,
    pub position: WatermarkPosition,
    /// Distance from the frame edges in pixels
    pub padding: u32,
}

impl WatermarkConfig {
    pub fn new(image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            scale: 0.08,
            opacity: 0.85,
            position: WatermarkPosition::default(),
            padding: 20,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale.clamp(0.01, 1.0);
        self
    }

    /// Set watermark opacity (0.0 = invisible, 1.0 = fully opaque).
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn with_position(mut self, position: WatermarkPosition) -> Self {
        self.position = position;
        self
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    /// Check if the watermark image exists.
    pub fn is_available(&self) -> bool {
        Path::new(&self.image_path).is_file()
    }

    /// Overlay position expressions.
    fn position_exprs(&self) -> (String, String) {
        let p = self.padding;
        match self.position {
            WatermarkPosition::TopLeft => (p.to_string(), p.to_string()),
            WatermarkPosition::TopRight => (format!("W-w-{p}"), p.to_string()),
            WatermarkPosition::BottomLeft => (p.to_string(), format!("H-h-{p}")),
            WatermarkPosition::BottomRight => (format!("W-w-{p}"), format!("H-h-{p}")),
        }
    }

    /// Overlay op for a frame of the given size.
    pub fn overlay_op(&self, frame: Resolution) -> FilterOp {
        let width = ((frame.width as f64 * self.scale) as u32).max(2);
        let (x, y) = self.position_exprs();
        FilterOp::Overlay(ImageOverlay {
            path: self.image_path.clone(),
            width,
            opacity: self.opacity,
            x,
            y,
        })
    }
}
