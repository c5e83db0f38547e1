//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use spliceo_media::{AssembleOptions, HardwareProfile, RenderOptions, WatermarkConfig, WatermarkPosition};
use spliceo_models::QualityPreset;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Concurrent FFmpeg processes per job. `None` uses the preset's default.
    pub max_workers: Option<usize>,
    /// Segment timeout as a multiple of segment duration
    pub segment_timeout_ratio: f64,
    pub segment_timeout_floor: Duration,
    pub segment_timeout_ceiling: Duration,
    /// Wall-clock limit for a whole job
    pub job_timeout: Duration,
    /// Work directory for temporary files
    pub work_dir: PathBuf,
    /// Keep per-job scratch files after the job finishes
    pub keep_work_dir: bool,
    /// Preset used when a job does not name one
    pub default_quality: QualityPreset,
    /// Force colour grading on or off; `None` follows the preset
    pub color_grading: Option<bool>,
    /// Stream-copy untouched segments
    pub smart_copy: bool,
    /// Probe and use NVENC when available
    pub gpu_enabled: bool,
    /// Constant output frame rate, if forced
    pub output_fps: Option<f64>,
    pub duration_tolerance_secs: f64,
    /// Fail jobs whose assembled duration is off by more than the tolerance
    pub strict_duration: bool,
    /// Watermark image for non-paid jobs
    pub watermark_path: Option<PathBuf>,
    pub watermark_opacity: f32,
    pub watermark_scale: f64,
    pub watermark_position: WatermarkPosition,
    pub watermark_padding: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            segment_timeout_ratio: 30.0,
            segment_timeout_floor: Duration::from_secs(60),
            segment_timeout_ceiling: Duration::from_secs(3600),
            job_timeout: Duration::from_secs(7200), // 2 hours
            work_dir: PathBuf::from("/tmp/spliceo"),
            keep_work_dir: false,
            default_quality: QualityPreset::default(),
            color_grading: None,
            smart_copy: true,
            gpu_enabled: true,
            output_fps: None,
            duration_tolerance_secs: 0.5,
            strict_duration: false,
            watermark_path: None,
            watermark_opacity: 0.85,
            watermark_scale: 0.08,
            watermark_position: WatermarkPosition::default(),
            watermark_padding: 20,
        }
    }
}

impl WorkerConfig {
    /// Create config from `SPLICEO_*` environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_workers: env_parse::<usize>("SPLICEO_MAX_WORKERS").filter(|n| *n > 0),
            segment_timeout_ratio: env_parse("SPLICEO_SEGMENT_TIMEOUT_RATIO")
                .filter(|r: &f64| *r > 0.0)
                .unwrap_or(d.segment_timeout_ratio),
            segment_timeout_floor: env_secs("SPLICEO_SEGMENT_TIMEOUT_FLOOR_SECS")
                .unwrap_or(d.segment_timeout_floor),
            segment_timeout_ceiling: env_secs("SPLICEO_SEGMENT_TIMEOUT_CEILING_SECS")
                .unwrap_or(d.segment_timeout_ceiling),
            job_timeout: env_secs("SPLICEO_JOB_TIMEOUT_SECS").unwrap_or(d.job_timeout),
            work_dir: std::env::var("SPLICEO_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.work_dir),
            keep_work_dir: env_bool("SPLICEO_KEEP_WORK_DIR").unwrap_or(d.keep_work_dir),
            default_quality: env_parse("SPLICEO_QUALITY").unwrap_or(d.default_quality),
            color_grading: env_bool("SPLICEO_COLOR_GRADING"),
            smart_copy: env_bool("SPLICEO_SMART_COPY").unwrap_or(d.smart_copy),
            gpu_enabled: env_bool("SPLICEO_GPU_ENABLED").unwrap_or(d.gpu_enabled),
            output_fps: env_parse("SPLICEO_OUTPUT_FPS"),
            duration_tolerance_secs: env_parse("SPLICEO_DURATION_TOLERANCE_SECS")
                .unwrap_or(d.duration_tolerance_secs),
            strict_duration: env_bool("SPLICEO_STRICT_DURATION").unwrap_or(d.strict_duration),
            watermark_path: std::env::var("SPLICEO_WATERMARK_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            watermark_opacity: env_parse("SPLICEO_WATERMARK_OPACITY").unwrap_or(d.watermark_opacity),
            watermark_scale: env_parse("SPLICEO_WATERMARK_SCALE").unwrap_or(d.watermark_scale),
            watermark_position: env_parse("SPLICEO_WATERMARK_POSITION")
                .unwrap_or(d.watermark_position),
            watermark_padding: env_parse("SPLICEO_WATERMARK_PADDING").unwrap_or(d.watermark_padding),
        }
    }

    /// Whether colour grading applies to a job rendered with `preset`.
    pub fn color_grading_for(&self, preset: QualityPreset) -> bool {
        self.color_grading
            .unwrap_or_else(|| preset.settings().color_grading)
    }

    /// Orchestrator options for a job. An explicit worker count is used as
    /// is; the preset default is capped by the hardware profile.
    pub fn render_options(&self, preset: QualityPreset, hardware: &HardwareProfile) -> RenderOptions {
        let max_workers = self
            .max_workers
            .unwrap_or_else(|| hardware.recommended_workers(preset.settings().workers));
        RenderOptions {
            max_workers,
            timeout_ratio: self.segment_timeout_ratio,
            timeout_floor: self.segment_timeout_floor,
            timeout_ceiling: self.segment_timeout_ceiling,
            fps: self.output_fps,
        }
    }

    pub fn assemble_options(&self) -> AssembleOptions {
        AssembleOptions {
            tolerance_secs: self.duration_tolerance_secs,
            strict: self.strict_duration,
            ..AssembleOptions::default()
        }
    }

    /// Watermark settings, when an image is configured.
    pub fn watermark(&self) -> Option<WatermarkConfig> {
        self.watermark_path.as_ref().map(|path| {
            WatermarkConfig::new(path)
                .with_opacity(self.watermark_opacity)
                .with_scale(self.watermark_scale)
                .with_position(self.watermark_position)
                .with_padding(self.watermark_padding)
        })
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_secs)
}

fn env_bool(key: &str) -> Option<bool> {
    let value = std::env::var(key).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
