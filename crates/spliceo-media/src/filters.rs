//! Typed FFmpeg filter operations.
//!
//! A video chain is a list of [`FilterOp`]s. Each op is tagged with the memory
//! domain it needs, so a chain can be checked before any filtergraph text
//! exists. Text is produced only by [`FilterChain::render`].

use std::fmt;
use std::path::PathBuf;

use crate::error::{MediaError, MediaResult};

/// Where decoded frames live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    /// Ordinary process memory.
    Host,
    /// Accelerator memory (CUDA frames).
    Device,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Host => f.write_str("host"),
            Domain::Device => f.write_str("device"),
        }
    }
}

/// Domain contract of a filter operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainReq {
    /// Only valid on host frames.
    Host,
    /// Only valid on device frames.
    Device,
    /// Metadata-only, valid anywhere.
    Any,
    /// Host to device.
    Upload,
    /// Device to host.
    Download,
}

/// Caption or label drawn with `drawtext`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextOverlay {
    /// Raw text; escaped at render time.
    pub text: String,
    /// X position expression.
    pub x: String,
    /// Y position expression.
    pub y: String,
    pub font_size: f64,
    /// FFmpeg colour (`0xRRGGBB`, `yellow`, ...).
    pub font_color: String,
    pub border_width: f64,
    pub border_color: Option<String>,
    /// Box colour (`black@0.7`) when a background box is drawn.
    pub box_color: Option<String>,
    /// Visibility window in segment-relative seconds.
    pub enable: Option<(f64, f64)>,
}

/// Image overlay read through a `movie=` source.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOverlay {
    pub path: PathBuf,
    /// Width the image is scaled to; height keeps the aspect ratio.
    pub width: u32,
    pub opacity: f32,
    /// Overlay x expression (`20`, `W-w-20`).
    pub x: String,
    /// Overlay y expression.
    pub y: String,
}

/// One video filter operation.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// `hwupload_cuda`.
    HwUpload,
    /// `hwdownload` followed by the host pixel format.
    HwDownload,
    /// `scale_cuda`.
    ScaleDevice { width: u32, height: u32 },
    /// `format=`.
    Format(&'static str),
    /// Software `scale` with lanczos.
    Scale { width: u32, height: u32 },
    Crop { width: u32, height: u32, x: u32, y: u32 },
    /// Timestamp remap for a playback speed.
    SetPts { speed: f64 },
    DrawText(TextOverlay),
    /// Fixed eq + unsharp + vibrance grade.
    ColorGrade,
    Overlay(ImageOverlay),
    /// `setsar=1`.
    SetSar,
}

/// Colour grade applied by [`FilterOp::ColorGrade`].
pub const COLOR_GRADE_FILTER: &str =
    "eq=brightness=0.02:contrast=1.1:saturation=1.15,unsharp=3:3:1.5:3:3:0.5,vibrance=0.15";

impl FilterOp {
    pub fn domain_req(&self) -> DomainReq {
        match self {
            FilterOp::HwUpload => DomainReq::Upload,
            FilterOp::HwDownload => DomainReq::Download,
            FilterOp::ScaleDevice { .. } => DomainReq::Device,
            FilterOp::SetSar => DomainReq::Any,
            FilterOp::Format(_)
            | FilterOp::Scale { .. }
            | FilterOp::Crop { .. }
            | FilterOp::SetPts { .. }
            | FilterOp::DrawText(_)
            | FilterOp::ColorGrade
            | FilterOp::Overlay(_) => DomainReq::Host,
        }
    }

    /// Whether the op can only run on host frames.
    pub fn is_host_only(&self) -> bool {
        self.domain_req() == DomainReq::Host
    }

    /// Short name for logs and validation errors.
    pub fn name(&self) -> &'static str {
        match self {
            FilterOp::HwUpload => "hwupload_cuda",
            FilterOp::HwDownload => "hwdownload",
            FilterOp::ScaleDevice { .. } => "scale_cuda",
            FilterOp::Format(_) => "format",
            FilterOp::Scale { .. } => "scale",
            FilterOp::Crop { .. } => "crop",
            FilterOp::SetPts { .. } => "setpts",
            FilterOp::DrawText(_) => "drawtext",
            FilterOp::ColorGrade => "color_grade",
            FilterOp::Overlay(_) => "overlay",
            FilterOp::SetSar => "setsar",
        }
    }

    /// Filter text for a linear chain. Overlays are rendered by the chain.
    fn render_linear(&self) -> String {
        match self {
            FilterOp::HwUpload => "hwupload_cuda".to_string(),
            FilterOp::HwDownload => "hwdownload,format=nv12".to_string(),
            FilterOp::ScaleDevice { width, height } => format!("scale_cuda={width}:{height}"),
            FilterOp::Format(pix_fmt) => format!("format={pix_fmt}"),
            FilterOp::Scale { width, height } => format!("scale={width}:{height}:flags=lanczos"),
            FilterOp::Crop { width, height, x, y } => format!("crop={width}:{height}:{x}:{y}"),
            FilterOp::SetPts { speed } => format!("setpts={}*PTS", format_number(1.0 / speed)),
            FilterOp::DrawText(t) => render_drawtext(t),
            FilterOp::ColorGrade => COLOR_GRADE_FILTER.to_string(),
            FilterOp::Overlay(o) => format!("overlay={}:{}:format=auto", o.x, o.y),
            FilterOp::SetSar => "setsar=1".to_string(),
        }
    }
}

fn render_drawtext(t: &TextOverlay) -> String {
    let mut parts = vec![
        format!("text='{}'", escape_filter_text(&t.text)),
        format!("x={}", t.x),
        format!("y={}", t.y),
        format!("fontsize={}", format_number(t.font_size)),
        format!("fontcolor={}", t.font_color),
    ];
    if t.border_width > 0.0 {
        parts.push(format!("borderw={}", format_number(t.border_width)));
        if let Some(color) = &t.border_color {
            parts.push(format!("bordercolor={color}"));
        }
    }
    if let Some(color) = &t.box_color {
        parts.push("box=1".to_string());
        parts.push(format!("boxcolor={color}"));
    }
    if let Some((start, end)) = t.enable {
        parts.push(format!("enable='between(t,{start:.3},{end:.3})'"));
    }
    format!("drawtext={}", parts.join(":"))
}

/// Rendered video filtergraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedGraph {
    /// No video filtering.
    Empty,
    /// Linear chain for `-vf`.
    Simple(String),
    /// Labelled graph for `-filter_complex`; map `output` as the video stream.
    Complex { graph: String, output: String },
}

/// Ordered video filter operations plus the domain frames enter in.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    entry: Domain,
    ops: Vec<FilterOp>,
}

impl FilterChain {
    pub fn new(entry: Domain) -> Self {
        Self {
            entry,
            ops: Vec::new(),
        }
    }

    pub fn push(&mut self, op: FilterOp) {
        self.ops.push(op);
    }

    pub fn entry(&self) -> Domain {
        self.entry
    }

    pub fn ops(&self) -> &[FilterOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn has_host_ops(&self) -> bool {
        self.ops.iter().any(FilterOp::is_host_only)
    }

    /// Simulate the domain state across the chain.
    ///
    /// Fails when an op runs in the wrong domain or the chain does not end
    /// in `exit`.
    pub fn validate(&self, exit: Domain) -> MediaResult<()> {
        let mut state = self.entry;
        for (pos, op) in self.ops.iter().enumerate() {
            state = match (op.domain_req(), state) {
                (DomainReq::Any, s) => s,
                (DomainReq::Host, Domain::Host) => Domain::Host,
                (DomainReq::Device, Domain::Device) => Domain::Device,
                (DomainReq::Upload, Domain::Host) => Domain::Device,
                (DomainReq::Download, Domain::Device) => Domain::Host,
                (_, s) => {
                    return Err(MediaError::invalid_plan(format!(
                        "`{}` at position {} cannot run on {} frames",
                        op.name(),
                        pos,
                        s
                    )));
                }
            };
        }
        if state != exit {
            return Err(MediaError::invalid_plan(format!(
                "chain ends on {state} frames but the encoder expects {exit} frames"
            )));
        }
        Ok(())
    }

    /// Render to FFmpeg filtergraph syntax.
    pub fn render(&self) -> RenderedGraph {
        if self.ops.is_empty() {
            return RenderedGraph::Empty;
        }
        if !self.ops.iter().any(|op| matches!(op, FilterOp::Overlay(_))) {
            let chain = self
                .ops
                .iter()
                .map(FilterOp::render_linear)
                .collect::<Vec<_>>()
                .join(",");
            return RenderedGraph::Simple(chain);
        }

        // Overlays split the chain into labelled sections with a movie source each.
        let mut sections: Vec<String> = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        let mut current = "0:v".to_string();
        let mut counter = 0usize;

        for op in &self.ops {
            let FilterOp::Overlay(overlay) = op else {
                pending.push(op.render_linear());
                continue;
            };
            if !pending.is_empty() {
                let label = format!("v{counter}");
                counter += 1;
                sections.push(format!("[{current}]{}[{label}]", pending.join(",")));
                pending.clear();
                current = label;
            }
            let wm = format!("wm{counter}");
            let out = format!("v{counter}");
            counter += 1;
            sections.push(format!(
                "movie='{}',scale={}:-1,format=rgba,colorchannelmixer=aa={:.2}[{wm}]",
                escape_filter_path(&overlay.path.to_string_lossy()),
                overlay.width,
                overlay.opacity,
            ));
            sections.push(format!("[{current}][{wm}]{}[{out}]", op.render_linear()));
            current = out;
        }

        let output = "vout".to_string();
        if pending.is_empty() {
            sections.push(format!("[{current}]null[{output}]"));
        } else {
            sections.push(format!("[{current}]{}[{output}]", pending.join(",")));
        }

        RenderedGraph::Complex {
            graph: sections.join(";"),
            output,
        }
    }
}

/// Audio filter operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioOp {
    /// `atempo`, defined over `[0.5, 2.0]`.
    Atempo(f64),
}

impl AudioOp {
    fn render(&self) -> String {
        match self {
            AudioOp::Atempo(v) => format!("atempo={}", format_number(*v)),
        }
    }
}

/// Render an audio chain for `-af`, `None` when empty.
pub fn render_audio_chain(ops: &[AudioOp]) -> Option<String> {
    if ops.is_empty() {
        return None;
    }
    Some(ops.iter().map(AudioOp::render).collect::<Vec<_>>().join(","))
}

/// Escape text for a single-quoted filter option value.
///
/// Filter arguments are unescaped twice (graph, then option parser), so a
/// literal quote needs `'\\\''`.
pub fn escape_filter_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("'\\\\\\''"),
            ':' => out.push_str("\\:"),
            '[' => out.push_str("\\["),
            ']' => out.push_str("\\]"),
            '\n' | '\r' => out.push(' '),
            other => out.push(other),
        }
    }
    out
}

/// Escape a file path for a quoted `movie=` argument.
pub fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}

/// Compact decimal: at most six fractional digits, no trailing zeros.
pub fn format_number(v: f64) -> String {
    let s = format!("{v:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
