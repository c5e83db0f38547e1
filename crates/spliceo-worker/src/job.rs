//! Render job pipeline.
//!
//! probe -> parse edit map -> timeline -> classify -> capability probe ->
//! render segments -> assemble -> [`JobResult`].

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::{counter, histogram};
use tracing::{info, warn, Instrument};

use spliceo_media::fs_utils::file_size;
use spliceo_media::{
    build_timeline, classify_timeline, probe_hardware, Assembler, ClassifyOptions,
    CommandExecutor, FfprobeProbe, HardwareProfile, MediaError, MediaProbe, PlanContext,
    ProcessExecutor, RenderOrchestrator,
};
use spliceo_models::{
    EditMap, EncodingConfig, EntryCollection, JobInput, JobResult, JobStats, SkippedEntry,
};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

const JOBS_TOTAL: &str = "spliceo_jobs_total";
const JOB_SECONDS: &str = "spliceo_job_seconds";

/// Runs render jobs against one set of external collaborators.
pub struct RenderJob {
    config: WorkerConfig,
    executor: Arc<dyn CommandExecutor>,
    probe: Arc<dyn MediaProbe>,
    /// Injected capability profile; probed per job when absent.
    hardware: Option<HardwareProfile>,
}

/// What a finished pipeline hands back before it becomes a [`JobResult`].
struct Rendered {
    stats: JobStats,
    failed_segments: Vec<usize>,
    warnings: Vec<String>,
}

impl RenderJob {
    pub fn new(
        config: WorkerConfig,
        executor: Arc<dyn CommandExecutor>,
        probe: Arc<dyn MediaProbe>,
    ) -> Self {
        Self {
            config,
            executor,
            probe,
            hardware: None,
        }
    }

    /// Job runner backed by real `ffmpeg`/`ffprobe` processes.
    pub fn with_process_tools(config: WorkerConfig) -> Self {
        let executor: Arc<dyn CommandExecutor> = Arc::new(ProcessExecutor::new());
        let probe = Arc::new(FfprobeProbe::new(executor.clone()));
        Self::new(config, executor, probe)
    }

    /// Skip the capability probe and use `hardware` for every job.
    pub fn with_hardware(mut self, hardware: HardwareProfile) -> Self {
        self.hardware = Some(hardware);
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run one job to completion. Never fails: errors become a failed
    /// [`JobResult`] carrying their category.
    pub async fn run(&self, input: &JobInput) -> JobResult {
        let logger = JobLogger::new(&input.id, "render");
        let span = logger.create_span();

        async {
            let started = Instant::now();
            let work_dir = self.config.work_dir.join(input.id.as_str());
            logger.log_start(&format!(
                "{} -> {}",
                input.source_path.display(),
                input.output_path.display()
            ));

            let limit = self.config.job_timeout;
            let outcome = match tokio::time::timeout(
                limit,
                self.execute(input, &logger, &work_dir, started),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(WorkerError::JobTimeout(limit)),
            };

            if !self.config.keep_work_dir {
                if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %work_dir.display(), error = %e, "Failed to clean up work dir");
                    }
                }
            }

            let elapsed = started.elapsed().as_secs_f64();
            match outcome {
                Ok(done) => {
                    counter!(JOBS_TOTAL, "status" => "success").increment(1);
                    histogram!(JOB_SECONDS).record(elapsed);
                    logger.log_completion(&format!(
                        "{:.1}s output in {:.1}s ({} failed segments)",
                        done.stats.output_duration_secs,
                        elapsed,
                        done.failed_segments.len()
                    ));
                    JobResult::Success {
                        job_id: input.id.clone(),
                        output_path: input.output_path.clone(),
                        failed_segments: done.failed_segments,
                        warnings: done.warnings,
                        stats: done.stats,
                        completed_at: Utc::now(),
                    }
                }
                Err(e) => {
                    let category = e.category();
                    counter!(JOBS_TOTAL, "status" => category.as_str()).increment(1);
                    logger.log_error(&format!("{category}: {e}"));
                    JobResult::failure(input.id.clone(), category, e.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        input: &JobInput,
        logger: &JobLogger,
        work_dir: &Path,
        started: Instant,
    ) -> WorkerResult<Rendered> {
        // Step 1: source
        let log = logger.with_operation("probe");
        if !tokio::fs::try_exists(&input.source_path).await.unwrap_or(false) {
            return Err(MediaError::FileNotFound(input.source_path.clone()).into());
        }
        let source = self.probe.probe(&input.source_path).await?;
        log.log_progress(&format!(
            "{}x{} {:.2}s {} audio={}",
            source.width, source.height, source.duration, source.codec, source.has_audio
        ));

        // Step 2: edit map
        let map = self.load_edit_map(input).await?;
        let mut warnings: Vec<String> = map.skipped.iter().map(describe_skipped).collect();

        // Step 3: job-wide settings
        let source_size = source.resolution();
        let output_size = input.output_resolution.resolve(source_size).even();
        let color_grading = self.config.color_grading_for(input.quality);
        let watermark = if input.paid_user {
            None
        } else {
            match self.config.watermark() {
                Some(wm) if wm.is_available() => Some(wm),
                Some(wm) => {
                    log.log_warning(&format!(
                        "watermark image missing: {}",
                        wm.image_path.display()
                    ));
                    None
                }
                None => None,
            }
        };

        // Step 4: timeline
        let mut timeline = build_timeline(&map.edits, &map.subtitles, source.duration)?;
        if timeline.is_empty() {
            return Err(WorkerError::invalid_input(
                "edit map removes the entire video",
            ));
        }
        let copyable = classify_timeline(
            &mut timeline,
            &ClassifyOptions {
                source_size,
                output_size,
                color_grading,
                debug_overlay: input.debug_overlay,
                smart_copy: self.config.smart_copy,
                watermark: watermark.is_some(),
            },
        );
        logger.with_operation("timeline").log_progress(&format!(
            "{} segments ({} copyable), {:.2}s kept, {:.2}s cut",
            timeline.len(),
            copyable,
            timeline.kept_duration(),
            timeline.removed_duration()
        ));
        if let Some(warning) = mixed_codec_warning(&source.codec, copyable, timeline.len()) {
            log.log_warning(&warning);
            warnings.push(warning);
        }

        // Step 5: hardware, probed once and fixed for the job
        let hardware = self.hardware_profile().await;
        let encoding = EncodingConfig::from_preset(input.quality)
            .with_nvenc_tuning(hardware.nvenc_tuning());
        let options = self.config.render_options(input.quality, &hardware);
        info!(
            nvenc = hardware.nvenc_usable,
            scale_cuda = hardware.scale_cuda_usable,
            workers = options.max_workers,
            quality = %input.quality,
            output = %output_size,
            "Render settings"
        );

        // Step 6: render
        let ctx = PlanContext {
            source_size,
            output_size,
            standard_pixel_format: source.is_standard_pixel_format(),
            has_audio: source.has_audio,
            color_grading,
            debug_overlay: input.debug_overlay,
            watermark,
        };
        let orchestrator = RenderOrchestrator::new(
            self.executor.clone(),
            hardware,
            encoding,
            work_dir.join("segments"),
        )
        .with_options(options);
        let report = orchestrator
            .render_all(timeline.segments(), &input.source_path, &ctx)
            .await?;
        for failed in &report.failures {
            warnings.push(format!("segment {} dropped: {}", failed.index, failed.message));
        }

        // Step 7: assemble
        let assembler = Assembler::new(self.executor.clone(), self.probe.clone())
            .with_options(self.config.assemble_options());
        let assembly = assembler
            .assemble(&report.rendered, &input.output_path, work_dir)
            .await?;
        if let Some(warning) = assembly.warning {
            warnings.push(warning);
        }

        let elapsed = started.elapsed().as_secs_f64();
        let stats = JobStats {
            elapsed_secs: elapsed,
            output_size_bytes: file_size(&input.output_path).await,
            source_size_bytes: source.size,
            source_duration_secs: source.duration,
            output_duration_secs: assembly.actual_duration,
            segments_total: timeline.len(),
            segments_copied: report.copied(),
            segments_encoded: report.encoded(),
            segments_failed: report.failures.len(),
            hardware_fallbacks: report.hardware_fallbacks(),
            realtime_factor: if elapsed > 0.0 {
                assembly.actual_duration / elapsed
            } else {
                0.0
            },
        };

        Ok(Rendered {
            stats,
            failed_segments: report.failed_indices(),
            warnings,
        })
    }

    async fn load_edit_map(&self, input: &JobInput) -> WorkerResult<EditMap> {
        let Some(path) = &input.edit_map_path else {
            return Ok(EditMap::default());
        };
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            WorkerError::invalid_input(format!("cannot read edit map {}: {e}", path.display()))
        })?;
        let map = EditMap::from_json_str(&text)?;
        info!(
            edits = map.edits.len(),
            subtitles = map.subtitles.len(),
            skipped = map.skipped.len(),
            "Edit map loaded"
        );
        Ok(map)
    }

    async fn hardware_profile(&self) -> HardwareProfile {
        if let Some(hw) = &self.hardware {
            return hw.clone();
        }
        if !self.config.gpu_enabled {
            return HardwareProfile::cpu_only("GPU disabled by configuration");
        }
        probe_hardware(self.executor.as_ref()).await
    }
}

/// Copied segments keep the source codec while encoded ones are H.264, so a
/// non-H.264 source with both kinds concatenates mismatched streams.
fn mixed_codec_warning(source_codec: &str, copyable: usize, total: usize) -> Option<String> {
    if source_codec.eq_ignore_ascii_case("h264") || copyable == 0 || copyable == total {
        return None;
    }
    Some(format!(
        "source codec {source_codec} is stream-copied next to h264 segments; \
         set SPLICEO_SMART_COPY=0 if the output does not play"
    ))
}

fn describe_skipped(entry: &SkippedEntry) -> String {
    let collection = match entry.collection {
        EntryCollection::Edits => "edit",
        EntryCollection::Subtitles => "subtitle",
    };
    format!("skipped {collection} #{}: {}", entry.index, entry.reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_codec_warning() {
        assert!(mixed_codec_warning("h264", 2, 5).is_none());
        assert!(mixed_codec_warning("H264", 2, 5).is_none());
        assert!(mixed_codec_warning("hevc", 0, 5).is_none());
        assert!(mixed_codec_warning("hevc", 5, 5).is_none());
        let warning = mixed_codec_warning("hevc", 2, 5).unwrap();
        assert!(warning.contains("hevc"));
    }

    #[test]
    fn test_describe_skipped() {
        let entry = SkippedEntry {
            collection: EntryCollection::Subtitles,
            index: 2,
            reason: "end must be after start".into(),
        };
        assert_eq!(
            describe_skipped(&entry),
            "skipped subtitle #2: end must be after start"
        );
    }
}
