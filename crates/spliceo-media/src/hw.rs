//! Hardware encode capability.
//!
//! [`probe_hardware`] runs once per job; the resulting [`HardwareProfile`] is
//! passed read-only to the planner and orchestrator.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use spliceo_models::encoding::NVENC_CODEC;
use spliceo_models::NvencTuning;

use crate::command::{CommandSpec, FfmpegCommand};
use crate::runner::CommandExecutor;

/// CUVID decoders accepted as evidence of NVDEC support.
const CUVID_DECODERS: &[&str] = &["h264_cuvid", "hevc_cuvid", "vp9_cuvid", "av1_cuvid"];

const QUERY_TIMEOUT: Duration = Duration::from_secs(10);
const TEST_ENCODE_TIMEOUT: Duration = Duration::from_secs(20);

/// One GPU as reported by `nvidia-smi`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuInfo {
    pub name: String,
    pub total_memory_mb: u64,
    pub free_memory_mb: u64,
    /// `major.minor`, e.g. `8.9`.
    pub compute_capability: String,
    pub driver_version: String,
}

impl GpuInfo {
    /// `major * 10 + minor`, 0 when unparseable.
    pub fn compute_score(&self) -> u32 {
        let mut parts = self.compute_capability.trim().split('.');
        let major = parts.next().and_then(|p| p.parse::<u32>().ok());
        let minor = parts.next().and_then(|p| p.parse::<u32>().ok()).unwrap_or(0);
        major.map(|m| m * 10 + minor).unwrap_or(0)
    }
}

/// Hardware capability, fixed for the lifetime of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// NVENC encode path usable.
    pub nvenc_usable: bool,
    /// `scale_cuda` works; otherwise scaling always happens on the host.
    pub scale_cuda_usable: bool,
    pub gpu: Option<GpuInfo>,
    /// Why the hardware path is disabled, for logs.
    pub disabled_reason: Option<String>,
}

impl HardwareProfile {
    pub fn cpu_only(reason: impl Into<String>) -> Self {
        Self {
            nvenc_usable: false,
            scale_cuda_usable: false,
            gpu: None,
            disabled_reason: Some(reason.into()),
        }
    }

    /// Fully capable profile without device details.
    pub fn gpu_available() -> Self {
        Self {
            nvenc_usable: true,
            scale_cuda_usable: true,
            gpu: None,
            disabled_reason: None,
        }
    }

    pub fn with_gpu(mut self, gpu: GpuInfo) -> Self {
        self.gpu = Some(gpu);
        self
    }

    /// NVENC buffer tuning for the detected device.
    pub fn nvenc_tuning(&self) -> NvencTuning {
        match &self.gpu {
            Some(gpu) => NvencTuning::for_device(gpu.total_memory_mb, gpu.compute_score()),
            None => NvencTuning::default(),
        }
    }

    /// Cap on concurrent encoder sessions for this device.
    ///
    /// Each session holds device memory; too many fail at encoder init.
    pub fn max_workers(&self) -> Option<usize> {
        if !self.nvenc_usable {
            return None;
        }
        let gpu = self.gpu.as_ref()?;
        Some(match gpu.total_memory_mb {
            m if m >= 20_000 => 4,
            m if m >= 10_000 => 3,
            _ => 2,
        })
    }

    /// Worker count after applying the device cap.
    pub fn recommended_workers(&self, requested: usize) -> usize {
        let requested = requested.max(1);
        match self.max_workers() {
            Some(cap) => requested.min(cap),
            None => requested,
        }
    }
}

/// Probe the NVENC path: driver, FFmpeg encoder/decoder support, and a short
/// test encode. Never fails; any failure yields a CPU-only profile.
pub async fn probe_hardware(executor: &dyn CommandExecutor) -> HardwareProfile {
    // Step 1: driver
    let driver = CommandSpec::new("nvidia-smi", ["-L"])
        .with_label("nvidia-smi")
        .with_timeout(QUERY_TIMEOUT);
    match executor.execute(&driver).await {
        Ok(out) if out.success() && !out.stdout_text().trim().is_empty() => {
            let text = out.stdout_text();
            let first = text.lines().next().unwrap_or_default();
            info!(gpu = %first.trim(), "NVIDIA driver detected");
        }
        Ok(_) => return disabled("nvidia-smi reported no devices"),
        Err(e) => return disabled(format!("nvidia-smi unavailable: {e}")),
    }

    // Step 2: FFmpeg built with NVENC / CUVID
    let encoders = match list_codecs(executor, "-encoders").await {
        Some(list) => list,
        None => return disabled("could not list FFmpeg encoders"),
    };
    if !encoders.contains(NVENC_CODEC) {
        return disabled(format!("FFmpeg lacks {NVENC_CODEC}"));
    }
    let decoders = match list_codecs(executor, "-decoders").await {
        Some(list) => list,
        None => return disabled("could not list FFmpeg decoders"),
    };
    if !CUVID_DECODERS.iter().any(|d| decoders.contains(d)) {
        return disabled("FFmpeg has no CUVID decoders");
    }

    // Step 3: real encode
    let encode = test_source_command()
        .output_args(["-c:v", NVENC_CODEC, "-preset", "p4", "-f", "null"])
        .into_spec("nvenc test encode", Some(TEST_ENCODE_TIMEOUT));
    match executor.execute(&encode).await {
        Ok(out) if out.success() => debug!("NVENC test encode passed"),
        Ok(out) => {
            return disabled(format!(
                "NVENC test encode failed: {}",
                last_line(&out.stderr_tail)
            ))
        }
        Err(e) => return disabled(format!("NVENC test encode failed: {e}")),
    }

    // Step 4: device scaling, optional
    let scale = test_source_command()
        .video_filter("format=nv12,hwupload_cuda,scale_cuda=320:240")
        .output_args(["-c:v", NVENC_CODEC, "-preset", "p4", "-f", "null"])
        .into_spec("scale_cuda test", Some(TEST_ENCODE_TIMEOUT));
    let scale_cuda_usable = matches!(executor.execute(&scale).await, Ok(out) if out.success());
    if !scale_cuda_usable {
        warn!("scale_cuda not working; scaling will run on the host");
    }

    let gpu = query_gpu(executor).await;
    if let Some(gpu) = &gpu {
        info!(
            name = %gpu.name,
            total_memory_mb = gpu.total_memory_mb,
            free_memory_mb = gpu.free_memory_mb,
            compute_capability = %gpu.compute_capability,
            driver = %gpu.driver_version,
            "GPU hardware acceleration available"
        );
    }

    HardwareProfile {
        nvenc_usable: true,
        scale_cuda_usable,
        gpu,
        disabled_reason: None,
    }
}

fn disabled(reason: impl Into<String>) -> HardwareProfile {
    let reason = reason.into();
    warn!(reason = %reason, "Hardware encoding disabled, using CPU");
    HardwareProfile::cpu_only(reason)
}

fn test_source_command() -> FfmpegCommand {
    FfmpegCommand::new("testsrc=duration=0.5:size=640x480:rate=30", "-").input_args(["-f", "lavfi"])
}

async fn list_codecs(executor: &dyn CommandExecutor, flag: &str) -> Option<String> {
    let spec = CommandSpec::new("ffmpeg", ["-hide_banner", flag])
        .with_label(format!("ffmpeg {flag}"))
        .with_timeout(QUERY_TIMEOUT);
    match executor.execute(&spec).await {
        Ok(out) if out.success() => Some(out.stdout_text()),
        _ => None,
    }
}

async fn query_gpu(executor: &dyn CommandExecutor) -> Option<GpuInfo> {
    let spec = CommandSpec::new(
        "nvidia-smi",
        [
            "--query-gpu=name,memory.total,memory.free,compute_cap,driver_version",
            "--format=csv,noheader,nounits",
        ],
    )
    .with_label("nvidia-smi query")
    .with_timeout(QUERY_TIMEOUT);

    match executor.execute(&spec).await {
        Ok(out) if out.success() => parse_gpu_query(&out.stdout_text()),
        _ => None,
    }
}

/// Parse the first line of `nvidia-smi --query-gpu=... --format=csv,noheader,nounits`.
pub fn parse_gpu_query(text: &str) -> Option<GpuInfo> {
    let line = text.lines().find(|l| !l.trim().is_empty())?;
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 5 {
        return None;
    }
    let mb = |s: &str| s.parse::<f64>().ok().map(|v| v.max(0.0) as u64);
    Some(GpuInfo {
        name: parts[0].to_string(),
        total_memory_mb: mb(parts[1])?,
        free_memory_mb: mb(parts[2]).unwrap_or(0),
        compute_capability: parts[3].to_string(),
        driver_version: parts[4].to_string(),
    })
}

fn last_line(text: &str) -> &str {
    text.lines().last().unwrap_or("no diagnostic output")
}
