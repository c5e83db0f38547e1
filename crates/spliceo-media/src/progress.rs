//! FFmpeg `-progress pipe:2` parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Progress percentage given the expected output duration in seconds.
    pub fn percentage(&self, expected_secs: f64) -> f64 {
        if expected_secs <= 0.0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / 1000.0 / expected_secs) * 100.0).clamp(0.0, 100.0)
    }

    /// Estimated seconds remaining.
    pub fn eta_seconds(&self, expected_secs: f64) -> Option<f64> {
        if self.speed <= 0.0 || self.out_time_ms <= 0 {
            return None;
        }
        let remaining = expected_secs - self.out_time_ms as f64 / 1000.0;
        Some((remaining / self.speed).max(0.0))
    }
}

/// Whether a stderr line belongs to the `-progress` key/value stream.
pub fn is_progress_line(line: &str) -> bool {
    let line = line.trim();
    match line.split_once('=') {
        Some((key, value)) => {
            !key.is_empty()
                && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !value.contains(' ')
        }
        None => false,
    }
}

/// Fold one progress line into `current`. Returns a snapshot at the end of
/// each progress block.
pub fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "speed" => {
            // "1.5x" or "N/A"
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            current.is_complete = value == "end";
            return Some(current.clone());
        }
        _ => {}
    }
    None
}
