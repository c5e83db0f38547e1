//! Per-segment render planning.
//!
//! The planner gathers every operation a segment needs as typed [`FilterOp`]s,
//! picks the domain path once from that full list, lays the chain out in a
//! fixed order and validates it against the encoder's input domain.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use spliceo_models::encoding::OUTPUT_PIXEL_FORMAT;
use spliceo_models::{Resolution, Segment};

use crate::effects::{self, atempo_chain, debug_overlay_op, subtitle_ops};
use crate::error::MediaResult;
use crate::filters::{render_audio_chain, AudioOp, Domain, FilterChain, FilterOp};
use crate::hw::HardwareProfile;
use crate::watermark::WatermarkConfig;

/// How a segment's frames travel from decoder to encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainPath {
    /// Stream copy, no decode.
    Copy,
    /// NVDEC into device memory, device-only filters, NVENC.
    PureDevice,
    /// NVDEC into host memory, host filters, one upload, NVENC.
    Hybrid,
    /// Software decode, host filters, libx264.
    CpuOnly,
}

impl DomainPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainPath::Copy => "copy",
            DomainPath::PureDevice => "device",
            DomainPath::Hybrid => "hybrid",
            DomainPath::CpuOnly => "cpu",
        }
    }

    /// Whether the encode goes through NVENC.
    pub fn uses_hardware(&self) -> bool {
        matches!(self, DomainPath::PureDevice | DomainPath::Hybrid)
    }

    /// Input options selecting the decoder's output domain.
    pub fn decode_args(&self) -> Vec<String> {
        let args: &[&str] = match self {
            DomainPath::PureDevice => &["-hwaccel", "cuda", "-hwaccel_output_format", "cuda"],
            DomainPath::Hybrid => &["-hwaccel", "cuda"],
            DomainPath::Copy | DomainPath::CpuOnly => &[],
        };
        args.iter().map(|s| s.to_string()).collect()
    }

    /// Domain the encoder reads frames from.
    pub fn encoder_domain(&self) -> Domain {
        match self {
            DomainPath::PureDevice | DomainPath::Hybrid => Domain::Device,
            DomainPath::Copy | DomainPath::CpuOnly => Domain::Host,
        }
    }

    fn decoder_domain(&self) -> Domain {
        match self {
            DomainPath::PureDevice => Domain::Device,
            _ => Domain::Host,
        }
    }
}

impl fmt::Display for DomainPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job-wide facts the planner needs for every segment.
#[derive(Debug, Clone)]
pub struct PlanContext {
    pub source_size: Resolution,
    pub output_size: Resolution,
    /// Source is 8-bit 4:2:0 (or unknown).
    pub standard_pixel_format: bool,
    pub has_audio: bool,
    pub color_grading: bool,
    pub debug_overlay: bool,
    pub watermark: Option<WatermarkConfig>,
}

impl PlanContext {
    pub fn new(source_size: Resolution, output_size: Resolution) -> Self {
        Self {
            source_size,
            output_size,
            standard_pixel_format: true,
            has_audio: true,
            color_grading: false,
            debug_overlay: false,
            watermark: None,
        }
    }

    fn needs_scale(&self) -> bool {
        self.source_size != self.output_size
    }
}

/// Everything needed to build one segment's FFmpeg invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    pub segment_index: usize,
    pub start: f64,
    pub duration: f64,
    /// Seconds of output the encode should produce.
    pub expected_duration: f64,
    pub path: DomainPath,
    pub video: FilterChain,
    pub audio: Vec<AudioOp>,
    pub has_audio: bool,
}

impl RenderPlan {
    pub fn is_copy(&self) -> bool {
        self.path == DomainPath::Copy
    }

    /// Rendered `-af` chain.
    pub fn audio_filter(&self) -> Option<String> {
        if !self.has_audio {
            return None;
        }
        render_audio_chain(&self.audio)
    }
}

/// Builds [`RenderPlan`]s against one probed hardware profile.
pub struct Planner<'a> {
    ctx: &'a PlanContext,
    hardware: &'a HardwareProfile,
}

impl<'a> Planner<'a> {
    pub fn new(ctx: &'a PlanContext, hardware: &'a HardwareProfile) -> Self {
        Self { ctx, hardware }
    }

    /// Preferred plan: copy when allowed, else hardware when usable, else CPU.
    pub fn plan(&self, segment: &Segment) -> MediaResult<RenderPlan> {
        if segment.can_copy {
            return Ok(self.copy_plan(segment));
        }
        self.plan_encode(segment, self.hardware.nvenc_usable)
    }

    /// Software-only plan with the same effects, used after a hardware failure.
    pub fn plan_cpu(&self, segment: &Segment) -> MediaResult<RenderPlan> {
        self.plan_encode(segment, false)
    }

    fn copy_plan(&self, segment: &Segment) -> RenderPlan {
        RenderPlan {
            segment_index: segment.index,
            start: segment.start,
            duration: segment.duration(),
            expected_duration: segment.duration(),
            path: DomainPath::Copy,
            video: FilterChain::new(Domain::Host),
            audio: Vec::new(),
            has_audio: self.ctx.has_audio,
        }
    }

    fn plan_encode(&self, segment: &Segment, hardware: bool) -> MediaResult<RenderPlan> {
        let ctx = self.ctx;
        let effects = self.effect_ops(segment);

        let host_required = !effects.is_empty()
            || !ctx.standard_pixel_format
            || (ctx.needs_scale() && !self.hardware.scale_cuda_usable);
        let path = match (hardware, host_required) {
            (false, _) => DomainPath::CpuOnly,
            (true, false) => DomainPath::PureDevice,
            (true, true) => DomainPath::Hybrid,
        };

        let mut chain = FilterChain::new(path.decoder_domain());
        if path == DomainPath::PureDevice {
            if ctx.needs_scale() {
                chain.push(FilterOp::ScaleDevice {
                    width: ctx.output_size.width,
                    height: ctx.output_size.height,
                });
            }
            chain.push(FilterOp::SetSar);
        } else {
            if !ctx.standard_pixel_format {
                chain.push(FilterOp::Format(OUTPUT_PIXEL_FORMAT));
            }
            if ctx.needs_scale() {
                chain.push(FilterOp::Scale {
                    width: ctx.output_size.width,
                    height: ctx.output_size.height,
                });
            }
            for op in effects {
                chain.push(op);
            }
            chain.push(FilterOp::SetSar);
            chain.push(FilterOp::Format(OUTPUT_PIXEL_FORMAT));
            if path == DomainPath::Hybrid {
                chain.push(FilterOp::HwUpload);
            }
        }
        chain.validate(path.encoder_domain())?;

        let speed = segment.speed_factor();
        let audio = if ctx.has_audio {
            atempo_chain(speed)
        } else {
            Vec::new()
        };

        debug!(
            segment = segment.index,
            path = %path,
            ops = chain.ops().len(),
            "Planned segment"
        );

        Ok(RenderPlan {
            segment_index: segment.index,
            start: segment.start,
            duration: segment.duration(),
            expected_duration: segment.output_duration(),
            path,
            video: chain,
            audio,
            has_audio: ctx.has_audio,
        })
    }

    /// Host-only operations between the scale and exit normalization, in
    /// chain order.
    fn effect_ops(&self, segment: &Segment) -> Vec<FilterOp> {
        let ctx = self.ctx;
        let frame = ctx.output_size;
        let mut ops = Vec::new();

        if let Some(edit) = &segment.edit {
            ops.extend(effects::speed::video_op(edit.speed_factor));
            ops.extend(effects::zoom::ops(edit, frame));
        }
        if ctx.color_grading {
            ops.push(FilterOp::ColorGrade);
        }
        ops.extend(subtitle_ops(segment, frame));
        if ctx.debug_overlay {
            ops.push(debug_overlay_op(segment.index));
        }
        if let Some(watermark) = &ctx.watermark {
            ops.push(watermark.overlay_op(frame));
        }
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::RenderedGraph;
    use spliceo_models::{Edit, EditKind, Subtitle, ZoomFactor};

    const HD: Resolution = Resolution::new(1280, 720);
    const FHD: Resolution = Resolution::new(1920, 1080);

    fn gpu() -> HardwareProfile {
        HardwareProfile::gpu_available()
    }

    fn names(plan: &RenderPlan) -> Vec<&'static str> {
        plan.video.ops().iter().map(FilterOp::name).collect()
    }

    fn processed(segment: Segment) -> Segment {
        let mut segment = segment;
        segment.can_copy = false;
        segment.needs_processing = true;
        segment
    }

    #[test]
    fn test_copy_plan() {
        let ctx = PlanContext::new(HD, HD);
        let hw = gpu();
        let mut seg = Segment::new(0, 0.0, 10.0, None);
        seg.can_copy = true;
        seg.needs_processing = false;
        let plan = Planner::new(&ctx, &hw).plan(&seg).unwrap();
        assert!(plan.is_copy());
        assert!(plan.video.is_empty());
        assert!(plan.audio_filter().is_none());
    }

    #[test]
    fn test_pure_device_scale() {
        let ctx = PlanContext::new(FHD, HD);
        let hw = gpu();
        let seg = processed(Segment::new(0, 0.0, 10.0, None));
        let plan = Planner::new(&ctx, &hw).plan(&seg).unwrap();
        assert_eq!(plan.path, DomainPath::PureDevice);
        assert_eq!(names(&plan), vec!["scale_cuda", "setsar"]);
        assert_eq!(
            plan.video.render(),
            RenderedGraph::Simple("scale_cuda=1280:720,setsar=1".to_string())
        );
    }

    #[test]
    fn test_pure_device_falls_back_to_hybrid_without_scale_cuda() {
        let ctx = PlanContext::new(FHD, HD);
        let mut hw = gpu();
        hw.scale_cuda_usable = false;
        let seg = processed(Segment::new(0, 0.0, 10.0, None));
        let plan = Planner::new(&ctx, &hw).plan(&seg).unwrap();
        assert_eq!(plan.path, DomainPath::Hybrid);
        assert_eq!(names(&plan), vec!["scale", "setsar", "format", "hwupload_cuda"]);
    }

    #[test]
    fn test_subtitle_forces_hybrid() {
        let ctx = PlanContext::new(HD, HD);
        let hw = gpu();
        let zoom = Edit::new("z", EditKind::Zoom, 5.0, 8.0).with_zoom(ZoomFactor::Factor(1.5));
        let seg = processed(
            Segment::new(1, 5.0, 8.0, Some(zoom))
                .with_subtitles(vec![Subtitle::new("s", "Hello", 6.0, 7.0)]),
        );
        let plan = Planner::new(&ctx, &hw).plan(&seg).unwrap();
        assert_eq!(plan.path, DomainPath::Hybrid);
        assert_eq!(
            names(&plan),
            vec!["crop", "scale", "drawtext", "setsar", "format", "hwupload_cuda"]
        );
        assert_eq!(plan.video.ops().last(), Some(&FilterOp::HwUpload));
        assert!(!plan.video.ops().contains(&FilterOp::HwDownload));
    }

    #[test]
    fn test_fixed_order_with_everything() {
        let mut ctx = PlanContext::new(FHD, HD);
        ctx.standard_pixel_format = false;
        ctx.color_grading = true;
        ctx.debug_overlay = true;
        ctx.watermark = Some(WatermarkConfig::new("/tmp/wm.png"));
        let hw = gpu();
        let edit = Edit::new("e", EditKind::Speed, 0.0, 4.0)
            .with_speed(2.0)
            .with_zoom(ZoomFactor::Factor(2.0));
        let seg = processed(
            Segment::new(0, 0.0, 4.0, Some(edit))
                .with_subtitles(vec![Subtitle::new("s", "Hi", 1.0, 2.0)]),
        );
        let plan = Planner::new(&ctx, &hw).plan(&seg).unwrap();
        assert_eq!(
            names(&plan),
            vec![
                "format",
                "scale",
                "setpts",
                "crop",
                "scale",
                "color_grade",
                "drawtext",
                "drawtext",
                "overlay",
                "setsar",
                "format",
                "hwupload_cuda"
            ]
        );
        assert!((plan.expected_duration - 2.0).abs() < 1e-9);
        let caption = plan.video.ops().iter().find_map(|op| match op {
            FilterOp::DrawText(t) if t.text == "Hi" => Some(t.enable),
            _ => None,
        });
        assert_eq!(caption, Some(Some((0.5, 1.0))));
        assert_eq!(plan.audio_filter().as_deref(), Some("atempo=2"));
        assert!(matches!(plan.video.render(), RenderedGraph::Complex { .. }));
    }

    #[test]
    fn test_cpu_plan_mirrors_effects_without_upload() {
        let ctx = PlanContext::new(HD, HD);
        let hw = gpu();
        let seg = processed(
            Segment::new(0, 0.0, 3.0, None).with_subtitles(vec![Subtitle::new("s", "x", 0.0, 1.0)]),
        );
        let planner = Planner::new(&ctx, &hw);
        let hybrid = planner.plan(&seg).unwrap();
        let cpu = planner.plan_cpu(&seg).unwrap();

        assert_eq!(cpu.path, DomainPath::CpuOnly);
        assert_eq!(&hybrid.video.ops()[..hybrid.video.ops().len() - 1], cpu.video.ops());
        assert!(cpu.video.ops().iter().all(|op| op.is_host_only() || *op == FilterOp::SetSar));
    }

    #[test]
    fn test_cpu_only_profile() {
        let ctx = PlanContext::new(HD, HD);
        let hw = HardwareProfile::cpu_only("no gpu");
        let seg = processed(Segment::new(0, 0.0, 3.0, None));
        let plan = Planner::new(&ctx, &hw).plan(&seg).unwrap();
        assert_eq!(plan.path, DomainPath::CpuOnly);
        assert!(plan.path.decode_args().is_empty());
        assert_eq!(names(&plan), vec!["setsar", "format"]);
    }

    #[test]
    fn test_no_audio_drops_atempo() {
        let mut ctx = PlanContext::new(HD, HD);
        ctx.has_audio = false;
        let hw = HardwareProfile::cpu_only("no gpu");
        let edit = Edit::new("s", EditKind::Speed, 0.0, 4.0).with_speed(3.0);
        let seg = processed(Segment::new(0, 0.0, 4.0, Some(edit)));
        let plan = Planner::new(&ctx, &hw).plan(&seg).unwrap();
        assert!(plan.audio.is_empty());
        assert!(plan.audio_filter().is_none());
    }

    #[test]
    fn test_decode_args() {
        assert_eq!(
            DomainPath::PureDevice.decode_args(),
            vec!["-hwaccel", "cuda", "-hwaccel_output_format", "cuda"]
        );
        assert_eq!(DomainPath::Hybrid.decode_args(), vec!["-hwaccel", "cuda"]);
    }
}
