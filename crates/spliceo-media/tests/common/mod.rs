//! Scripted stand-ins for FFmpeg, FFprobe and nvidia-smi.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use spliceo_media::{
    CommandExecutor, CommandOutput, CommandSpec, MediaError, MediaProbe, MediaResult, VideoInfo,
};

/// What a scripted command does.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Exit 0. FFmpeg invocations get their output file created.
    Ok,
    /// Exit 0 with stdout.
    Stdout(String),
    /// Non-zero exit with a diagnostic line.
    Fail(i32, String),
    /// The command's timeout fired after the process wrote a diagnostic line.
    Timeout(String),
}

type Script = Box<dyn Fn(&CommandSpec) -> Outcome + Send + Sync>;
type Delay = Box<dyn Fn(&CommandSpec) -> Duration + Send + Sync>;

pub struct ScriptedExecutor {
    script: Script,
    delay: Option<Delay>,
    calls: Mutex<Vec<CommandSpec>>,
    concat_lists: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new(script: impl Fn(&CommandSpec) -> Outcome + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            delay: None,
            calls: Mutex::new(Vec::new()),
            concat_lists: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(|_| Outcome::Ok)
    }

    pub fn with_delay(
        mut self,
        delay: impl Fn(&CommandSpec) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls whose label mentions `segment N`.
    pub fn segment_calls(&self, index: usize) -> Vec<CommandSpec> {
        let prefix = format!("segment {index} ");
        self.calls()
            .into_iter()
            .filter(|c| c.label.starts_with(&prefix))
            .collect()
    }

    pub fn concat_lists(&self) -> Vec<String> {
        self.concat_lists.lock().unwrap().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(&self, spec: &CommandSpec) -> MediaResult<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if spec.arg_value("-f") == Some("concat") {
            if let Some(list) = spec.arg_value("-i") {
                let text = std::fs::read_to_string(list).unwrap_or_default();
                self.concat_lists.lock().unwrap().push(text);
            }
        }
        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(spec)).await;
        }

        let outcome = (self.script)(spec);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            Outcome::Ok => {
                if spec.program == "ffmpeg" {
                    if let Some(out) = spec.args.last().filter(|a| a.ends_with(".mp4")) {
                        std::fs::write(out, b"segment").unwrap();
                    }
                }
                Ok(CommandOutput {
                    exit_code: Some(0),
                    ..Default::default()
                })
            }
            Outcome::Stdout(text) => Ok(CommandOutput {
                exit_code: Some(0),
                stdout: text.into_bytes(),
                ..Default::default()
            }),
            Outcome::Fail(code, diag) => Ok(CommandOutput {
                exit_code: Some(code),
                stderr_tail: diag,
                ..Default::default()
            }),
            Outcome::Timeout(diag) => Err(MediaError::timeout(
                &spec.label,
                spec.timeout.map(|t| t.as_secs_f64()).unwrap_or_default(),
            )
            .with_stderr(diag)),
        }
    }
}

/// Probe reporting a fixed duration for whatever it is asked about.
pub struct FixedProbe {
    pub duration: f64,
    pub probed: Mutex<Vec<PathBuf>>,
}

impl FixedProbe {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            probed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MediaProbe for FixedProbe {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
        self.probed.lock().unwrap().push(path.to_path_buf());
        Ok(VideoInfo {
            duration: self.duration,
            width: 1280,
            height: 720,
            fps: 30.0,
            codec: "h264".to_string(),
            pix_fmt: Some("yuv420p".to_string()),
            has_audio: true,
            size: 1024,
            bitrate: 1_000_000,
        })
    }
}

/// Whether a spec is an NVENC encode.
pub fn is_nvenc(spec: &CommandSpec) -> bool {
    spec.arg_value("-c:v") == Some("h264_nvenc")
}

pub fn is_x264(spec: &CommandSpec) -> bool {
    spec.arg_value("-c:v") == Some("libx264")
}
