//! Render worker binary.
//!
//! Runs one job and prints its [`JobResult`] as JSON on stdout.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use spliceo_media::command::check_tool;
use spliceo_models::{ErrorCategory, JobId, JobInput, JobResult, OutputResolution, QualityPreset};
use spliceo_worker::{RenderJob, WorkerConfig, WorkerError};

#[derive(Parser, Debug)]
#[command(name = "spliceo-worker", version, about = "Render an edit map against a source video")]
struct Cli {
    /// Job description as JSON; replaces the positional arguments
    #[arg(long, conflicts_with_all = ["source", "output"])]
    job: Option<PathBuf>,

    /// Source video
    #[arg(required_unless_present = "job")]
    source: Option<PathBuf>,

    /// Output video
    #[arg(required_unless_present = "job")]
    output: Option<PathBuf>,

    /// Edit-map JSON document
    #[arg(short, long)]
    edit_map: Option<PathBuf>,

    /// Output resolution: 720p, 1080p, 1440p, 4k or original
    #[arg(short, long, default_value = "720p")]
    resolution: String,

    /// Quality preset: fast, balanced or quality
    #[arg(short, long)]
    quality: Option<QualityPreset>,

    /// Job ID (random when omitted)
    #[arg(long)]
    job_id: Option<String>,

    /// Burn segment indices into the frame
    #[arg(long)]
    debug_overlay: bool,

    /// Paid jobs skip the watermark
    #[arg(long)]
    paid_user: bool,

    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Concurrent FFmpeg processes
    #[arg(short = 'j', long)]
    max_workers: Option<usize>,

    /// Force the CPU-only path
    #[arg(long)]
    no_gpu: bool,

    /// Re-encode every segment
    #[arg(long)]
    no_smart_copy: bool,

    /// Fail when the assembled duration is off by more than the tolerance
    #[arg(long)]
    strict_duration: bool,

    /// Keep intermediate segment files
    #[arg(long)]
    keep_work_dir: bool,
}

impl Cli {
    fn apply(&self, config: &mut WorkerConfig) {
        if let Some(dir) = &self.work_dir {
            config.work_dir = dir.clone();
        }
        if let Some(n) = self.max_workers.filter(|n| *n > 0) {
            config.max_workers = Some(n);
        }
        if self.no_gpu {
            config.gpu_enabled = false;
        }
        if self.no_smart_copy {
            config.smart_copy = false;
        }
        if self.strict_duration {
            config.strict_duration = true;
        }
        if self.keep_work_dir {
            config.keep_work_dir = true;
        }
    }

    fn job_input(&self, config: &WorkerConfig) -> Result<JobInput> {
        if let Some(path) = &self.job {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading job file {}", path.display()))?;
            return serde_json::from_str(&text)
                .with_context(|| format!("parsing job file {}", path.display()));
        }

        let (Some(source), Some(output)) = (&self.source, &self.output) else {
            anyhow::bail!("source and output are required without --job");
        };
        let mut input = JobInput::new(source, output);
        if let Some(id) = &self.job_id {
            input.id = JobId::from_string(id);
        }
        input.edit_map_path = self.edit_map.clone();
        input.output_resolution = OutputResolution::parse_lenient(&self.resolution);
        input.quality = self.quality.unwrap_or(config.default_quality);
        input.debug_overlay = self.debug_overlay;
        input.paid_user = self.paid_user;
        Ok(input)
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("spliceo_worker=info,spliceo_media=info,spliceo_models=info"));

    // Logs go to stderr; stdout carries the job result.
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = WorkerConfig::from_env();
    cli.apply(&mut config);
    let input = cli.job_input(&config)?;

    info!("Starting spliceo-worker");
    info!("Worker config: {:?}", config);

    let result = match ["ffmpeg", "ffprobe"].into_iter().try_for_each(|t| check_tool(t).map(|_| ())) {
        Ok(()) => RenderJob::with_process_tools(config).run(&input).await,
        Err(e) => {
            let e = WorkerError::from(e);
            error!("Startup check failed: {}", e);
            JobResult::failure(input.id.clone(), e.category(), e.to_string())
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("serializing job result")?
    );

    if let JobResult::Failure { category, .. } = &result {
        std::process::exit(exit_code(*category));
    }
    Ok(())
}

/// Distinct exit codes per failure category, for scripting.
fn exit_code(category: ErrorCategory) -> i32 {
    match category {
        ErrorCategory::Input => 2,
        ErrorCategory::Resource => 3,
        ErrorCategory::Execution => 4,
        ErrorCategory::Timeout => 5,
        ErrorCategory::Consistency => 6,
        ErrorCategory::Internal => 1,
    }
}
