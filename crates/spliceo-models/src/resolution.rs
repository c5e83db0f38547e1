//! Frame sizes and output resolution presets.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Round both dimensions down to even numbers (4:2:0 chroma requirement).
    pub fn even(self) -> Self {
        Self {
            width: self.width & !1,
            height: self.height & !1,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Requested output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum OutputResolution {
    #[default]
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "1440p")]
    Qhd1440,
    #[serde(rename = "4k")]
    Uhd4k,
    /// Keep the source size.
    #[serde(rename = "original")]
    Original,
}

impl OutputResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputResolution::Hd720 => "720p",
            OutputResolution::Hd1080 => "1080p",
            OutputResolution::Qhd1440 => "1440p",
            OutputResolution::Uhd4k => "4k",
            OutputResolution::Original => "original",
        }
    }

    /// Parse a preset name. Unknown names fall back to 720p.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    /// Concrete output size for a given source size.
    pub fn resolve(&self, source: Resolution) -> Resolution {
        match self {
            OutputResolution::Hd720 => Resolution::new(1280, 720),
            OutputResolution::Hd1080 => Resolution::new(1920, 1080),
            OutputResolution::Qhd1440 => Resolution::new(2560, 1440),
            OutputResolution::Uhd4k => Resolution::new(3840, 2160),
            OutputResolution::Original => source,
        }
    }
}

impl FromStr for OutputResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "720p" | "720" => Ok(OutputResolution::Hd720),
            "1080p" | "1080" => Ok(OutputResolution::Hd1080),
            "1440p" | "1440" | "2k" => Ok(OutputResolution::Qhd1440),
            "4k" | "2160p" | "2160" => Ok(OutputResolution::Uhd4k),
            "original" | "source" => Ok(OutputResolution::Original),
            other => Err(format!("unknown output resolution: {other}")),
        }
    }
}

impl fmt::Display for OutputResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
