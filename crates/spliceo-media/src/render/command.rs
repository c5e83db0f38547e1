//! FFmpeg invocations for rendered segments.

use std::path::{Path, PathBuf};
use std::time::Duration;

use spliceo_models::EncodingConfig;

use crate::command::{CommandSpec, FfmpegCommand};
use crate::filters::RenderedGraph;
use crate::plan::RenderPlan;

/// Turns [`RenderPlan`]s into commands against one input file.
#[derive(Debug, Clone)]
pub struct SegmentCommands {
    input: PathBuf,
    encoding: EncodingConfig,
    fps: Option<f64>,
}

impl SegmentCommands {
    pub fn new(input: impl Into<PathBuf>, encoding: EncodingConfig) -> Self {
        Self {
            input: input.into(),
            encoding,
            fps: None,
        }
    }

    /// Force a constant output frame rate.
    pub fn with_fps(mut self, fps: Option<f64>) -> Self {
        self.fps = fps.filter(|f| f.is_finite() && *f > 0.0);
        self
    }

    pub fn build(&self, plan: &RenderPlan, output: &Path, timeout: Duration) -> CommandSpec {
        let label = format!("segment {} ({})", plan.segment_index, plan.path);
        let cmd = if plan.is_copy() {
            self.copy(plan, output)
        } else {
            self.encode(plan, output)
        };
        cmd.into_spec(label, Some(timeout))
            .with_expected_secs(plan.expected_duration)
    }

    /// Keyframe-aligned stream copy of `[start, start + duration)`.
    fn copy(&self, plan: &RenderPlan, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(&self.input, output)
            .seek(plan.start)
            .duration(plan.duration)
            .codec_copy()
            .output_args(["-avoid_negative_ts", "make_zero"])
    }

    fn encode(&self, plan: &RenderPlan, output: &Path) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(&self.input, output)
            .input_args(plan.path.decode_args())
            .seek(plan.start)
            .duration(plan.duration);

        cmd = match plan.video.render() {
            RenderedGraph::Empty => cmd.map("0:v:0"),
            RenderedGraph::Simple(chain) => cmd.map("0:v:0").video_filter(chain),
            RenderedGraph::Complex { graph, output } => {
                cmd.filter_complex(graph).map(format!("[{output}]"))
            }
        };

        cmd = if plan.has_audio {
            let cmd = cmd.map("0:a:0?");
            match plan.audio_filter() {
                Some(af) => cmd.audio_filter(af),
                None => cmd,
            }
        } else {
            cmd.no_audio()
        };

        let video_args = if plan.path.uses_hardware() {
            self.encoding.nvenc_args()
        } else {
            self.encoding.x264_args()
        };
        cmd = cmd.output_args(video_args);
        if plan.has_audio {
            cmd = cmd.output_args(self.encoding.audio_args());
        }
        if let Some(fps) = self.fps {
            cmd = cmd.output_arg("-r").output_arg(format!("{fps:.3}"));
        }
        cmd.faststart()
    }
}
