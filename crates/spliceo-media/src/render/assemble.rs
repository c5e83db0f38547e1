//! Lossless concatenation of rendered segments.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{ensure_parent, move_file, remove_quietly};
use crate::metrics;
use crate::probe::MediaProbe;
use crate::runner::CommandExecutor;

use super::orchestrator::RenderedSegment;

#[derive(Debug, Clone, PartialEq)]
pub struct AssembleOptions {
    /// Allowed gap between probed and expected duration, in seconds.
    pub tolerance_secs: f64,
    /// Fail on a duration mismatch instead of warning.
    pub strict: bool,
    pub timeout: Duration,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            tolerance_secs: 0.5,
            strict: false,
            timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssemblyReport {
    pub output: PathBuf,
    pub segments: usize,
    pub expected_duration: f64,
    pub actual_duration: f64,
    /// Set when the durations diverged beyond tolerance in lenient mode.
    pub warning: Option<String>,
}

pub struct Assembler {
    executor: Arc<dyn CommandExecutor>,
    probe: Arc<dyn MediaProbe>,
    options: AssembleOptions,
}

impl Assembler {
    pub fn new(executor: Arc<dyn CommandExecutor>, probe: Arc<dyn MediaProbe>) -> Self {
        Self {
            executor,
            probe,
            options: AssembleOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AssembleOptions) -> Self {
        self.options = options;
        self
    }

    /// Join `segments` in index order into `output`, then check the result's
    /// duration against the sum of the segments' expected durations.
    pub async fn assemble(
        &self,
        segments: &[RenderedSegment],
        output: &Path,
        work_dir: &Path,
    ) -> MediaResult<AssemblyReport> {
        if segments.is_empty() {
            return Err(MediaError::NoSegmentsRendered { failed: 0 });
        }
        let started = Instant::now();

        let mut ordered: Vec<&RenderedSegment> = segments.iter().collect();
        ordered.sort_by_key(|s| s.index);
        let expected: f64 = ordered.iter().map(|s| s.expected_duration).sum();

        ensure_parent(output).await?;
        if let [only] = ordered.as_slice() {
            move_file(&only.path, output).await?;
        } else {
            self.concat(&ordered, output, work_dir).await?;
        }
        metrics::record_assembly(ordered.len(), started.elapsed().as_secs_f64());

        let actual = self.probe.probe(output).await?.duration;
        let mut report = AssemblyReport {
            output: output.to_path_buf(),
            segments: ordered.len(),
            expected_duration: expected,
            actual_duration: actual,
            warning: None,
        };

        if (actual - expected).abs() > self.options.tolerance_secs {
            metrics::record_duration_mismatch();
            if self.options.strict {
                return Err(MediaError::DurationMismatch { expected, actual });
            }
            warn!(
                expected_secs = expected,
                actual_secs = actual,
                tolerance_secs = self.options.tolerance_secs,
                "Assembled duration differs from rendered segments"
            );
            report.warning = Some(format!(
                "output duration {actual:.3}s differs from expected {expected:.3}s"
            ));
        }

        info!(
            output = %output.display(),
            segments = report.segments,
            duration_secs = actual,
            "Assembled output"
        );
        Ok(report)
    }

    async fn concat(
        &self,
        ordered: &[&RenderedSegment],
        output: &Path,
        work_dir: &Path,
    ) -> MediaResult<()> {
        tokio::fs::create_dir_all(work_dir).await?;
        let list_path = work_dir.join("concat_list.txt");
        let list = concat_list(ordered.iter().map(|s| s.path.as_path()));
        tokio::fs::write(&list_path, list).await?;

        let spec = FfmpegCommand::new(&list_path, output)
            .input_args(["-f", "concat", "-safe", "0"])
            .codec_copy()
            .faststart()
            .into_spec("concat", Some(self.options.timeout));

        let result = self
            .executor
            .execute(&spec)
            .await
            .and_then(|out| out.into_result("Concatenation failed"));
        remove_quietly(&list_path).await;
        result.map(|_| ())
    }
}

/// Concat demuxer list, one `file '<path>'` line per entry.
pub fn concat_list<'a>(paths: impl IntoIterator<Item = &'a Path>) -> String {
    paths
        .into_iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', "'\\''")))
        .collect()
}
