//! Parsing of FFmpeg's `-progress pipe:2` key/value stream.
//!
//! With `-progress` FFmpeg interleaves `key=value` blocks, each terminated
//! by `progress=continue|end`, with its ordinary diagnostics on stderr.

use serde::{Deserialize, Serialize};

/// One completed progress block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Frames written so far
    pub frame: u64,
    /// Output position in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed relative to realtime
    pub speed: f64,
    /// Set on the final block
    pub is_complete: bool,
}

/// Classification of one stderr line.
#[derive(Debug, Clone, PartialEq)]
pub enum StderrLine {
    /// A progress block just completed
    Progress(FfmpegProgress),
    /// A progress key inside an unfinished block
    Partial,
    /// Anything else, e.g. an error message
    Diagnostic(String),
}

const PROGRESS_KEYS: &[&str] = &[
    "frame", "fps", "stream_", "bitrate", "total_size", "out_time", "dup_frames",
    "drop_frames", "speed", "progress",
];

/// Accumulates progress keys across lines.
#[derive(Debug, Default)]
pub struct ProgressParser {
    current: FfmpegProgress,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, line: &str) -> StderrLine {
        let trimmed = line.trim();
        let Some((key, value)) = trimmed.split_once('=') else {
            return StderrLine::Diagnostic(line.to_string());
        };
        if !PROGRESS_KEYS.iter().any(|k| key.starts_with(k)) {
            return StderrLine::Diagnostic(line.to_string());
        }

        match key {
            // Both keys are microseconds
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.current.out_time_ms = us / 1000;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.current.frame = frame;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.current.speed = speed;
                }
            }
            "progress" => {
                self.current.is_complete = value == "end";
                return StderrLine::Progress(self.current.clone());
            }
            _ => {}
        }
        StderrLine::Partial
    }
}
