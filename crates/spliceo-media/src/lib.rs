#![deny(unreachable_patterns)]
//! Timeline segmentation and hybrid GPU/CPU FFmpeg rendering.
//!
//! This crate provides:
//! - Boundary-set timeline segmentation and copy classification
//! - Typed filter operations with domain validation
//! - Per-segment render planning (copy, pure device, hybrid, CPU)
//! - Parallel rendering with hardware-to-CPU fallback and process-group timeouts
//! - Lossless concatenation with duration verification
//! - FFprobe and NVENC capability probes

pub mod command;
pub mod effects;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod hw;
pub mod metrics;
pub mod plan;
pub mod probe;
pub mod progress;
pub mod render;
pub mod runner;
pub mod timeline;
pub mod watermark;

pub use command::{CommandOutput, CommandSpec, FfmpegCommand};
pub use error::{MediaError, MediaResult};
pub use filters::{AudioOp, Domain, FilterChain, FilterOp, RenderedGraph};
pub use hw::{probe_hardware, GpuInfo, HardwareProfile};
pub use plan::{DomainPath, PlanContext, Planner, RenderPlan};
pub use probe::{FfprobeProbe, MediaProbe, VideoInfo};
pub use progress::FfmpegProgress;
pub use render::{
    AssembleOptions, Assembler, AssemblyReport, RenderOptions, RenderOrchestrator, RenderReport,
    RenderedSegment, SegmentFailure, SegmentState,
};
pub use runner::{CommandExecutor, ProcessExecutor};
pub use timeline::{build_timeline, classify, classify_timeline, ClassifyOptions, Timeline};
pub use watermark::{WatermarkConfig, WatermarkPosition};
