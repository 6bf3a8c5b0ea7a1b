//! Structured lifecycle logging for redaction jobs.

use std::path::Path;
use std::time::Duration;

use tracing::{error, info, info_span, warn, Span};
use vamos_models::{JobId, Stage};

use crate::error::WorkerError;

/// Emits a job's lifecycle events with the job ID attached as a field,
/// so one job can be followed through interleaved worker output.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
}

impl JobLogger {
    pub fn new(job_id: &JobId) -> Self {
        Self {
            job_id: job_id.clone(),
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Span wrapping the whole background run.
    pub fn span(&self) -> Span {
        info_span!("redaction_job", job_id = %self.job_id)
    }

    pub fn started(&self, source: &Path) {
        info!(job_id = %self.job_id, source = %source.display(), "Redaction job started");
    }

    /// A stage transition with a short description of the work ahead.
    pub fn entered(&self, stage: Stage, detail: &str) {
        info!(job_id = %self.job_id, stage = stage.as_str(), "{}", detail);
    }

    /// Frames of a chunk that went out unredacted because detection failed.
    pub fn passthrough(&self, chunk: usize, frames: usize) {
        warn!(
            job_id = %self.job_id,
            chunk,
            frames,
            "Detector failed; frames copied through unredacted"
        );
    }

    pub fn failed(&self, err: &WorkerError, elapsed: Duration) {
        error!(
            job_id = %self.job_id,
            kind = err.kind(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Redaction job failed: {}",
            err
        );
    }

    /// The failure could not be written back to the registry, usually
    /// because the job was evicted mid-run.
    pub fn unrecorded(&self, reason: &dyn std::fmt::Display) {
        warn!(job_id = %self.job_id, "Job failure not recorded: {}", reason);
    }

    pub fn completed(&self, result: &Path, elapsed: Duration) {
        info!(
            job_id = %self.job_id,
            result = %result.display(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Redaction job completed"
        );
    }
}
