//! Video encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hardware H.264 encoder.
pub const NVENC_CODEC: &str = "h264_nvenc";
/// Software H.264 encoder.
pub const X264_CODEC: &str = "libx264";
/// Audio codec for every re-encoded segment.
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Pixel format every rendered segment is normalized to.
pub const OUTPUT_PIXEL_FORMAT: &str = "yuv420p";

/// Quality/speed trade-off selected per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreset {
    Fast,
    #[default]
    Balanced,
    Quality,
}

/// Concrete encoder parameters behind a [`QualityPreset`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PresetSettings {
    /// NVENC constant-quality target.
    pub nvenc_cq: u8,
    /// x264 constant rate factor.
    pub x264_crf: u8,
    /// NVENC preset (`p1`..`p7`).
    pub nvenc_preset: String,
    /// x264 preset.
    pub x264_preset: String,
    /// x264 tune.
    pub tune: String,
    pub audio_bitrate: String,
    /// Default number of concurrent segment renders.
    pub workers: usize,
    pub color_grading: bool,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Fast => "fast",
            QualityPreset::Balanced => "balanced",
            QualityPreset::Quality => "quality",
        }
    }

    pub fn settings(&self) -> PresetSettings {
        let (cq, crf, nv, x, tune, ab, workers, grading) = match self {
            QualityPreset::Fast => (28, 26, "p1", "ultrafast", "fastdecode", "96k", 4, false),
            QualityPreset::Balanced => (24, 23, "p4", "veryfast", "film", "128k", 3, true),
            QualityPreset::Quality => (19, 20, "p7", "medium", "film", "192k", 2, true),
        };
        PresetSettings {
            nvenc_cq: cq,
            x264_crf: crf,
            nvenc_preset: nv.to_string(),
            x264_preset: x.to_string(),
            tune: tune.to_string(),
            audio_bitrate: ab.to_string(),
            workers,
            color_grading: grading,
        }
    }
}

impl FromStr for QualityPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(QualityPreset::Fast),
            "balanced" => Ok(QualityPreset::Balanced),
            "quality" => Ok(QualityPreset::Quality),
            other => Err(format!("unknown quality preset: {other}")),
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// NVENC buffer and rate-control caps, sized by device memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NvencTuning {
    pub surfaces: u32,
    pub lookahead: u32,
    pub maxrate: String,
    pub bufsize: String,
}

impl Default for NvencTuning {
    /// Safe settings when the device could not be queried.
    fn default() -> Self {
        Self::tier(32, 16, "15M", "30M")
    }
}

impl NvencTuning {
    fn tier(surfaces: u32, lookahead: u32, maxrate: &str, bufsize: &str) -> Self {
        Self {
            surfaces,
            lookahead,
            maxrate: maxrate.to_string(),
            bufsize: bufsize.to_string(),
        }
    }

    /// Pick a tier from total VRAM (MiB) and compute capability score
    /// (`major * 10 + minor`).
    pub fn for_device(total_memory_mb: u64, compute_score: u32) -> Self {
        match total_memory_mb {
            m if m >= 30_000 => {
                let surfaces = if compute_score >= 89 { 128 } else { 96 };
                Self::tier(surfaces, 32, "25M", "50M")
            }
            m if m >= 20_000 => Self::tier(96, 24, "20M", "40M"),
            m if m >= 10_000 => Self::tier(64, 20, "15M", "30M"),
            _ => Self::tier(32, 16, "10M", "20M"),
        }
    }
}

/// Encoder settings for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    pub preset: QualityPreset,
    pub settings: PresetSettings,
    #[serde(default)]
    pub nvenc: NvencTuning,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self::from_preset(QualityPreset::default())
    }
}

impl EncodingConfig {
    pub fn from_preset(preset: QualityPreset) -> Self {
        Self {
            preset,
            settings: preset.settings(),
            nvenc: NvencTuning::default(),
        }
    }

    /// Returns a new config with device-specific NVENC tuning.
    pub fn with_nvenc_tuning(mut self, tuning: NvencTuning) -> Self {
        self.nvenc = tuning;
        self
    }

    /// NVENC output arguments.
    ///
    /// No `-pix_fmt` here: the encoder consumes device frames whose format
    /// was fixed before upload.
    pub fn nvenc_args(&self) -> Vec<String> {
        let s = &self.settings;
        let cq = s.nvenc_cq.to_string();
        let lookahead = self.nvenc.lookahead.to_string();
        let surfaces = self.nvenc.surfaces.to_string();
        to_args(&[
            "-c:v",
            NVENC_CODEC,
            "-preset",
            s.nvenc_preset.as_str(),
            "-tune",
            "hq",
            "-rc",
            "vbr",
            "-cq",
            cq.as_str(),
            "-b:v",
            "0",
            "-maxrate",
            self.nvenc.maxrate.as_str(),
            "-bufsize",
            self.nvenc.bufsize.as_str(),
            "-profile:v",
            "high",
            "-spatial_aq",
            "1",
            "-temporal_aq",
            "1",
            "-rc-lookahead",
            lookahead.as_str(),
            "-surfaces",
            surfaces.as_str(),
        ])
    }

    /// Software encoder output arguments.
    pub fn x264_args(&self) -> Vec<String> {
        let s = &self.settings;
        let crf = s.x264_crf.to_string();
        to_args(&[
            "-c:v",
            X264_CODEC,
            "-preset",
            s.x264_preset.as_str(),
            "-tune",
            s.tune.as_str(),
            "-crf",
            crf.as_str(),
            "-pix_fmt",
            OUTPUT_PIXEL_FORMAT,
        ])
    }

    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            DEFAULT_AUDIO_CODEC.to_string(),
            "-b:a".to_string(),
            self.settings.audio_bitrate.clone(),
        ]
    }
}

fn to_args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
