//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root of the per-job working directories
    pub work_dir: PathBuf,
    /// Nominal chunk duration in seconds
    pub segment_seconds: u32,
    /// Frame sampling and re-encoding rate
    pub framerate: u32,
    /// Detections below this confidence are ignored
    pub min_confidence: f32,
    /// Blur mode used when a job does not choose one
    pub blur_mode: String,
    /// Feather width used when a job does not choose one
    pub feather_px: i32,
    /// Upper bound on chunk workers per job (0 = available parallelism)
    pub max_workers: usize,
    /// Age after which jobs and their results are retired
    pub job_max_age: Duration,
    /// How often the reaper runs
    pub reaper_interval: Duration,
    /// Kill a single FFmpeg invocation after this long (None = no limit)
    pub ffmpeg_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/vamos"),
            segment_seconds: 10,
            framerate: 30,
            min_confidence: 0.3,
            blur_mode: "gaussian".to_string(),
            feather_px: 8,
            max_workers: 0,
            job_max_age: Duration::from_secs(3600), // 1 hour
            reaper_interval: Duration::from_secs(60),
            ffmpeg_timeout: Some(Duration::from_secs(1800)),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("VAMOS_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            segment_seconds: std::env::var("VAMOS_SEGMENT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&s: &u32| s > 0)
                .unwrap_or(defaults.segment_seconds),
            framerate: std::env::var("VAMOS_FRAMERATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&f: &u32| f > 0)
                .unwrap_or(defaults.framerate),
            min_confidence: std::env::var("VAMOS_MIN_CONFIDENCE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_confidence),
            blur_mode: std::env::var("VAMOS_BLUR_MODE").unwrap_or(defaults.blur_mode),
            feather_px: std::env::var("VAMOS_FEATHER_PX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.feather_px),
            max_workers: std::env::var("VAMOS_MAX_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_workers),
            job_max_age: Duration::from_secs(
                std::env::var("VAMOS_JOB_MAX_AGE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            reaper_interval: Duration::from_secs(
                std::env::var("VAMOS_REAPER_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|&s: &u64| s > 0)
                    .unwrap_or(60),
            ),
            ffmpeg_timeout: match std::env::var("VAMOS_FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
            {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.ffmpeg_timeout,
            },
        }
    }

    /// Worker pool size for a job with `chunk_count` chunks.
    pub fn worker_count(&self, chunk_count: usize) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let limit = if self.max_workers == 0 {
            available
        } else {
            self.max_workers.min(available)
        };
        limit.min(chunk_count).max(1)
    }
}
