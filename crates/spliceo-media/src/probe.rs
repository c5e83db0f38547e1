//! FFprobe video information.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use spliceo_models::Resolution;

use crate::command::CommandSpec;
use crate::error::{MediaError, MediaResult};
use crate::runner::CommandExecutor;

/// Video file information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Video codec
    pub codec: String,
    /// Pixel format of the video stream (`yuv420p`, `yuv420p10le`, ...)
    pub pix_fmt: Option<String>,
    pub has_audio: bool,
    /// File size in bytes
    pub size: u64,
    /// Bitrate in bits/second
    pub bitrate: u64,
}

impl VideoInfo {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// 8-bit 4:2:0 sources need no format normalization on entry.
    /// Unknown formats are assumed to be standard.
    pub fn is_standard_pixel_format(&self) -> bool {
        match self.pix_fmt.as_deref() {
            None => true,
            Some(fmt) => matches!(fmt, "yuv420p" | "yuvj420p" | "nv12"),
        }
    }
}

/// Media inspection collaborator.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo>;
}

/// [`MediaProbe`] backed by `ffprobe -show_format -show_streams`.
#[derive(Clone)]
pub struct FfprobeProbe {
    executor: Arc<dyn CommandExecutor>,
    timeout: Duration,
}

impl FfprobeProbe {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            timeout: Duration::from_secs(30),
        }
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        let spec = CommandSpec::new(
            "ffprobe",
            [
                "-v".to_string(),
                "quiet".to_string(),
                "-print_format".to_string(),
                "json".to_string(),
                "-show_format".to_string(),
                "-show_streams".to_string(),
                path.to_string_lossy().to_string(),
            ],
        )
        .with_label("ffprobe")
        .with_timeout(self.timeout);

        let output = self.executor.execute(&spec).await?;
        if !output.success() {
            return Err(MediaError::FfprobeFailed {
                message: format!("FFprobe failed for {}", path.display()),
                stderr: Some(output.stderr_tail),
            });
        }

        parse_ffprobe_json(&output.stdout)
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    pix_fmt: Option<String>,
    duration: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Parse `ffprobe -print_format json` output.
pub fn parse_ffprobe_json(json: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let has_audio = probe.streams.iter().any(|s| s.codec_type == "audio");

    // Stream duration first, container duration as fallback.
    let duration = video_stream
        .duration
        .as_deref()
        .and_then(parse_positive)
        .or_else(|| probe.format.duration.as_deref().and_then(parse_positive))
        .ok_or_else(|| MediaError::InvalidVideo("Could not determine duration".to_string()))?;

    let size = probe
        .format
        .size
        .as_ref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let bitrate = probe
        .format
        .bit_rate
        .as_ref()
        .and_then(|b| b.parse::<u64>().ok())
        .unwrap_or(0);

    let fps = video_stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(30.0);

    let width = video_stream.width.unwrap_or(0);
    let height = video_stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(MediaError::InvalidVideo(
            "Video stream has no dimensions".to_string(),
        ));
    }

    Ok(VideoInfo {
        duration,
        width,
        height,
        fps,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        pix_fmt: video_stream.pix_fmt.clone(),
        has_audio,
        size,
        bitrate,
    })
}

fn parse_positive(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|d| d.is_finite() && *d > 0.0)
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok().filter(|f: &f64| *f > 0.0)
}
