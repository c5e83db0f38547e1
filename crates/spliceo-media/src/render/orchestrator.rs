//! Parallel segment rendering with hardware-to-CPU fallback.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use spliceo_models::{EncodingConfig, Segment};

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::remove_quietly;
use crate::hw::HardwareProfile;
use crate::metrics;
use crate::plan::{DomainPath, PlanContext, Planner, RenderPlan};
use crate::runner::CommandExecutor;

use super::command::SegmentCommands;
use super::state::{SegmentState, SegmentTracker};

/// Concurrency and timeout tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Concurrent FFmpeg processes. The only admission control for the GPU.
    pub max_workers: usize,
    /// Segment timeout as a multiple of its duration.
    pub timeout_ratio: f64,
    pub timeout_floor: Duration,
    pub timeout_ceiling: Duration,
    /// Constant output frame rate, if forced.
    pub fps: Option<f64>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_workers: 3,
            timeout_ratio: 30.0,
            timeout_floor: Duration::from_secs(60),
            timeout_ceiling: Duration::from_secs(3600),
            fps: None,
        }
    }
}

impl RenderOptions {
    /// Wall-clock limit for a segment of `secs` seconds.
    pub fn segment_timeout(&self, secs: f64) -> Duration {
        let floor = self.timeout_floor.as_secs_f64();
        let ceiling = self.timeout_ceiling.as_secs_f64().max(floor);
        let scaled = if secs.is_finite() && secs > 0.0 {
            secs * self.timeout_ratio
        } else {
            0.0
        };
        Duration::from_secs_f64(scaled.clamp(floor, ceiling))
    }
}

/// A segment file ready for assembly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedSegment {
    pub index: usize,
    pub path: PathBuf,
    pub domain: DomainPath,
    /// Output seconds this file should hold.
    pub expected_duration: f64,
    /// Rendered on the CPU after a hardware failure.
    pub hw_fallback: bool,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentFailure {
    pub index: usize,
    pub timed_out: bool,
    pub message: String,
    /// Diagnostic tail of the last failed process.
    pub stderr_tail: Option<String>,
}

/// Outcome of a render pass. Both lists are sorted by segment index.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderReport {
    pub rendered: Vec<RenderedSegment>,
    pub failures: Vec<SegmentFailure>,
    pub elapsed_secs: f64,
}

impl RenderReport {
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }

    pub fn copied(&self) -> usize {
        self.rendered
            .iter()
            .filter(|s| s.domain == DomainPath::Copy)
            .count()
    }

    pub fn encoded(&self) -> usize {
        self.rendered.len() - self.copied()
    }

    pub fn hardware_fallbacks(&self) -> usize {
        self.rendered.iter().filter(|s| s.hw_fallback).count()
    }

    /// Sum of the rendered segments' expected durations.
    pub fn expected_duration(&self) -> f64 {
        self.rendered.iter().map(|s| s.expected_duration).sum()
    }
}

/// Renders segments in parallel against one input, hardware profile and
/// encoding preset.
pub struct RenderOrchestrator {
    executor: Arc<dyn CommandExecutor>,
    hardware: HardwareProfile,
    encoding: EncodingConfig,
    options: RenderOptions,
    work_dir: PathBuf,
}

impl RenderOrchestrator {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        hardware: HardwareProfile,
        encoding: EncodingConfig,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executor,
            hardware,
            encoding,
            options: RenderOptions::default(),
            work_dir: work_dir.into(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn hardware(&self) -> &HardwareProfile {
        &self.hardware
    }

    /// Scratch file for a segment.
    pub fn segment_path(&self, index: usize) -> PathBuf {
        self.work_dir.join(format!("segment_{index:04}.mp4"))
    }

    /// Render every segment. Individual failures are collected in the
    /// report; the call fails only when nothing rendered.
    pub async fn render_all(
        &self,
        segments: &[Segment],
        input: &Path,
        ctx: &PlanContext,
    ) -> MediaResult<RenderReport> {
        let started = Instant::now();
        tokio::fs::create_dir_all(&self.work_dir).await?;

        let workers = self.options.max_workers.max(1);
        let planner = Planner::new(ctx, &self.hardware);
        let commands = SegmentCommands::new(input, self.encoding.clone()).with_fps(self.options.fps);
        let semaphore = Semaphore::new(workers);

        info!(
            segments = segments.len(),
            workers,
            nvenc = self.hardware.nvenc_usable,
            "Rendering segments"
        );

        let tasks = segments.iter().map(|segment| {
            let planner = &planner;
            let commands = &commands;
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| failure(segment.index, &MediaError::internal(e.to_string())))?;
                self.render_segment(planner, commands, segment).await
            }
        });
        let results = join_all(tasks).await;

        let mut report = RenderReport::default();
        for result in results {
            match result {
                Ok(rendered) => report.rendered.push(rendered),
                Err(failed) => report.failures.push(failed),
            }
        }
        report.rendered.sort_by_key(|s| s.index);
        report.failures.sort_by_key(|f| f.index);
        report.elapsed_secs = started.elapsed().as_secs_f64();

        if report.rendered.is_empty() {
            error!(failed = report.failures.len(), "No segments rendered");
            return Err(MediaError::NoSegmentsRendered {
                failed: report.failures.len(),
            });
        }
        if !report.failures.is_empty() {
            warn!(
                failed = ?report.failed_indices(),
                rendered = report.rendered.len(),
                "Continuing with partial render"
            );
        }
        info!(
            rendered = report.rendered.len(),
            copied = report.copied(),
            fallbacks = report.hardware_fallbacks(),
            elapsed_secs = report.elapsed_secs,
            "Segments rendered"
        );
        Ok(report)
    }

    async fn render_segment(
        &self,
        planner: &Planner<'_>,
        commands: &SegmentCommands,
        segment: &Segment,
    ) -> Result<RenderedSegment, SegmentFailure> {
        let started = Instant::now();
        let index = segment.index;
        let output = self.segment_path(index);
        let mut tracker = SegmentTracker::new(index);

        let plan = planner.plan(segment).map_err(|e| failure(index, &e))?;
        let first_state = match plan.path {
            DomainPath::Copy => SegmentState::Copying,
            DomainPath::PureDevice | DomainPath::Hybrid => SegmentState::EncodingHw,
            DomainPath::CpuOnly => SegmentState::EncodingCpu,
        };
        tracker.advance(first_state).map_err(|e| failure(index, &e))?;
        debug!(segment = %segment.label(), path = %plan.path, "Segment started");

        let mut final_plan = plan;
        let mut hw_fallback = false;
        let mut outcome = self.run(commands, &final_plan, segment, &output).await;

        if let Err(e) = &outcome {
            if final_plan.path.uses_hardware() && !e.is_timeout() {
                warn!(
                    segment = index,
                    path = %final_plan.path,
                    error = %e,
                    "Hardware encode failed, retrying on CPU"
                );
                metrics::record_hw_fallback();
                remove_quietly(&output).await;
                tracker
                    .advance(SegmentState::EncodingCpu)
                    .map_err(|e| failure(index, &e))?;
                hw_fallback = true;
                outcome = match planner.plan_cpu(segment) {
                    Ok(cpu_plan) => {
                        final_plan = cpu_plan;
                        self.run(commands, &final_plan, segment, &output).await
                    }
                    Err(e) => Err(e),
                };
            }
        }

        match outcome {
            Ok(()) => {
                tracker
                    .advance(SegmentState::Done)
                    .map_err(|e| failure(index, &e))?;
                let elapsed = started.elapsed().as_secs_f64();
                metrics::record_segment_rendered(final_plan.path.as_str(), elapsed);
                debug!(segment = index, path = %final_plan.path, elapsed_secs = elapsed, "Segment done");
                Ok(RenderedSegment {
                    index,
                    path: output,
                    domain: final_plan.path,
                    expected_duration: final_plan.expected_duration,
                    hw_fallback,
                    elapsed_secs: elapsed,
                })
            }
            Err(e) => {
                if let Err(err) = tracker.advance(SegmentState::Failed) {
                    warn!(segment = index, error = %err, "Tracker rejected failure transition");
                }
                remove_quietly(&output).await;
                metrics::record_segment_failed(if e.is_timeout() { "timeout" } else { "error" });
                error!(
                    segment = %segment.label(),
                    states = ?tracker.history(),
                    error = %e,
                    "Segment failed"
                );
                Err(failure(index, &e))
            }
        }
    }

    async fn run(
        &self,
        commands: &SegmentCommands,
        plan: &RenderPlan,
        segment: &Segment,
        output: &Path,
    ) -> MediaResult<()> {
        let timeout = self
            .options
            .segment_timeout(segment.duration().max(plan.expected_duration));
        let spec = commands.build(plan, output, timeout);
        self.executor
            .execute(&spec)
            .await?
            .into_result(format!("{} failed", spec.label))?;

        if tokio::fs::metadata(output).await.is_err() {
            return Err(MediaError::ffmpeg_failed(
                format!("{} produced no output", spec.label),
                None,
                Some(0),
            ));
        }
        Ok(())
    }
}

fn failure(index: usize, e: &MediaError) -> SegmentFailure {
    SegmentFailure {
        index,
        timed_out: e.is_timeout(),
        message: e.to_string(),
        stderr_tail: e.stderr_tail().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_clamped() {
        let opts = RenderOptions::default();
        assert_eq!(opts.segment_timeout(0.5), Duration::from_secs(60));
        assert_eq!(opts.segment_timeout(10.0), Duration::from_secs(300));
        assert_eq!(opts.segment_timeout(600.0), Duration::from_secs(3600));
        assert_eq!(opts.segment_timeout(f64::NAN), Duration::from_secs(60));
    }

    #[test]
    fn test_report_counts() {
        let seg = |index, domain, hw_fallback| RenderedSegment {
            index,
            path: PathBuf::from(format!("/w/{index}.mp4")),
            domain,
            expected_duration: 2.0,
            hw_fallback,
            elapsed_secs: 0.1,
        };
        let report = RenderReport {
            rendered: vec![
                seg(0, DomainPath::Copy, false),
                seg(1, DomainPath::Hybrid, false),
                seg(3, DomainPath::CpuOnly, true),
            ],
            failures: vec![SegmentFailure {
                index: 2,
                timed_out: true,
                message: "timed out".into(),
                stderr_tail: None,
            }],
            elapsed_secs: 1.0,
        };
        assert_eq!(report.copied(), 1);
        assert_eq!(report.encoded(), 2);
        assert_eq!(report.hardware_fallbacks(), 1);
        assert_eq!(report.failed_indices(), vec![2]);
        assert!((report.expected_duration() - 6.0).abs() < 1e-9);
    }
}
