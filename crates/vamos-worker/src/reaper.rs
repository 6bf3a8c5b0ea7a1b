//! Background retirement of expired jobs and stale results.
//!
//! Each pass:
//! - Evicts registry entries older than the maximum job age
//! - Deletes `*_final.mp4` results older than the same window
//! - Removes job directories left empty by the above

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::fs;
use tokio::time::interval;
use tracing::{debug, error, info};
use vamos_media::fs_utils::remove_dir_if_empty;
use vamos_media::MediaResult;

use crate::config::WorkerConfig;
use crate::metrics;
use crate::registry::ProgressRegistry;

/// What one reaper pass removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub evicted: usize,
    pub files_removed: usize,
    pub dirs_removed: usize,
}

pub struct JobReaper {
    registry: Arc<ProgressRegistry>,
    work_dir: PathBuf,
    max_age: Duration,
    interval: Duration,
}

impl JobReaper {
    pub fn new(registry: Arc<ProgressRegistry>, config: &WorkerConfig) -> Self {
        Self {
            registry,
            work_dir: config.work_dir.clone(),
            max_age: config.job_max_age,
            interval: config.reaper_interval,
        }
    }

    /// Run passes forever. Spawn as a background task.
    pub async fn run(&self) {
        info!(
            "Starting job reaper (interval: {:?}, max age: {:?})",
            self.interval, self.max_age
        );

        let mut ticker = interval(self.interval);
        loop {
            ticker.tick().await;
            let report = self.run_once().await;
            if report != ReapReport::default() {
                info!(
                    "Reaper pass complete: {} jobs evicted, {} results and {} directories removed",
                    report.evicted, report.files_removed, report.dirs_removed
                );
            }
        }
    }

    /// Run a single pass.
    pub async fn run_once(&self) -> ReapReport {
        let evicted = self.registry.evict_expired(self.max_age);
        for job_id in &evicted {
            debug!(%job_id, "Evicted expired job");
        }
        metrics::record_jobs_evicted(evicted.len());

        let mut report = ReapReport {
            evicted: evicted.len(),
            ..ReapReport::default()
        };

        if let Err(e) = self.sweep_results(&mut report).await {
            error!("Result sweep of {} failed: {}", self.work_dir.display(), e);
        }
        report
    }

    async fn sweep_results(&self, report: &mut ReapReport) -> MediaResult<()> {
        if !self.work_dir.is_dir() {
            return Ok(());
        }

        let now = SystemTime::now();
        let mut jobs = fs::read_dir(&self.work_dir).await?;
        while let Some(job_dir) = jobs.next_entry().await? {
            if !job_dir.file_type().await?.is_dir() {
                continue;
            }
            let path = job_dir.path();

            let mut entries = fs::read_dir(&path).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file = entry.path();
                if is_final_artifact(&file) && self.is_expired(&file, now).await {
                    match fs::remove_file(&file).await {
                        Ok(()) => {
                            debug!("Removed expired result: {}", file.display());
                            report.files_removed += 1;
                        }
                        Err(e) => error!("Failed to remove {}: {}", file.display(), e),
                    }
                }
            }

            if remove_dir_if_empty(&path).await? {
                report.dirs_removed += 1;
            }
        }
        Ok(())
    }

    async fn is_expired(&self, file: &Path, now: SystemTime) -> bool {
        match fs::metadata(file).await.and_then(|m| m.modified()) {
            Ok(modified) => now
                .duration_since(modified)
                .map(|age| age > self.max_age)
                .unwrap_or(false),
            Err(_) => false,
        }
    }
}

fn is_final_artifact(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with("_final.mp4"))
        .unwrap_or(false)
}
