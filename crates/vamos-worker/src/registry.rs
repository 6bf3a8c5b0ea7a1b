//! Progress registry: process-wide job state.
//!
//! Each job owns its own lock, so writers for different jobs never contend.
//! Every accepted mutation is published on the job's watch channel, which is
//! what progress streams wait on.
//!
//! All writes go through [`ProgressRegistry::mutate`], which enforces:
//! - terminal jobs are frozen
//! - status only moves forward
//! - overall progress stays in `[0, 100]` and never decreases
//! - each chunk's progress stays in `[0, 100]` and never decreases

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;
use vamos_models::{JobId, JobSnapshot, JobStatus, Stage};

/// Progress reserved before chunk work starts.
pub const MASKING_BASE: f64 = 10.0;
/// Share of overall progress covered by chunk work.
pub const MASKING_SPAN: f64 = 85.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job {0} already finished")]
    Terminal(JobId),

    #[error("job {job_id}: status cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("job {job_id}: chunk {index} out of range ({count} chunks)")]
    ChunkOutOfRange {
        job_id: JobId,
        index: usize,
        count: usize,
    },
}

/// A chunk progress report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChunkUpdate {
    /// Intra-frame progress: `fraction` of the detections of 0-based frame
    /// `frame` applied, out of `total` frames.
    Partial {
        frame: usize,
        total: usize,
        fraction: f64,
    },
    /// `done` of `total` frames fully written. Authoritative.
    Frames { done: usize, total: usize },
}

impl ChunkUpdate {
    fn percent(&self) -> f64 {
        match *self {
            ChunkUpdate::Partial {
                frame,
                total,
                fraction,
            } => {
                if total == 0 {
                    return 100.0;
                }
                (frame as f64 + fraction.clamp(0.0, 1.0)) / total as f64 * 100.0
            }
            ChunkUpdate::Frames { done, total } => {
                if total == 0 {
                    return 100.0;
                }
                done as f64 / total as f64 * 100.0
            }
        }
    }
}

/// Overall progress while chunks are being processed.
pub fn overall_from_chunks(chunk_progress: &[f64]) -> f64 {
    if chunk_progress.is_empty() {
        return MASKING_BASE;
    }
    let mean = chunk_progress.iter().sum::<f64>() / chunk_progress.len() as f64;
    MASKING_BASE + MASKING_SPAN / 100.0 * mean
}

struct JobRecord {
    snapshot: JobSnapshot,
    /// Frames fully written per chunk
    completed_frames: Vec<usize>,
}

struct JobEntry {
    record: Mutex<JobRecord>,
    updates: watch::Sender<JobSnapshot>,
}

impl JobEntry {
    fn lock(&self) -> MutexGuard<'_, JobRecord> {
        self.record.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Concurrency-safe map from job ID to job state.
#[derive(Default)]
pub struct ProgressRegistry {
    jobs: RwLock<HashMap<JobId, Arc<JobEntry>>>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job. Replaces any previous job with the same ID.
    pub fn create(&self, snapshot: JobSnapshot) {
        let job_id = snapshot.id.clone();
        let (updates, _) = watch::channel(snapshot.clone());
        let entry = Arc::new(JobEntry {
            record: Mutex::new(JobRecord {
                completed_frames: vec![0; snapshot.chunk_progress.len()],
                snapshot,
            }),
            updates,
        });
        self.write_jobs().insert(job_id, entry);
    }

    /// Current state of a job.
    pub fn snapshot(&self, job_id: &JobId) -> Option<JobSnapshot> {
        self.entry(job_id).ok().map(|entry| entry.lock().snapshot.clone())
    }

    /// Change notifications for a job. The channel closes when the job is removed.
    pub fn subscribe(&self, job_id: &JobId) -> Option<watch::Receiver<JobSnapshot>> {
        self.entry(job_id).ok().map(|entry| entry.updates.subscribe())
    }

    /// Apply `f` to a copy of the job's state and commit it if it respects the
    /// registry invariants. Progress values are clamped rather than rejected.
    pub fn mutate<F>(&self, job_id: &JobId, f: F) -> Result<JobSnapshot, RegistryError>
    where
        F: FnOnce(&mut JobSnapshot),
    {
        let entry = self.entry(job_id)?;
        let mut record = entry.lock();
        let committed = Self::commit(&mut record, job_id, f)?;
        entry.updates.send_replace(committed.clone());
        Ok(committed)
    }

    fn commit<F>(record: &mut JobRecord, job_id: &JobId, f: F) -> Result<JobSnapshot, RegistryError>
    where
        F: FnOnce(&mut JobSnapshot),
    {
        let current = &record.snapshot;
        if current.is_terminal() {
            return Err(RegistryError::Terminal(job_id.clone()));
        }

        let mut next = current.clone();
        f(&mut next);

        if !current.status.can_transition_to(next.status) {
            return Err(RegistryError::InvalidTransition {
                job_id: job_id.clone(),
                from: current.status,
                to: next.status,
            });
        }

        // Identity and history are not writable
        next.id = current.id.clone();
        next.created_at = current.created_at;

        next.overall_progress = clamp_progress(next.overall_progress).max(current.overall_progress);

        if current.chunk_progress.is_empty() {
            for value in next.chunk_progress.iter_mut() {
                *value = clamp_progress(*value);
            }
            record.completed_frames = vec![0; next.chunk_progress.len()];
        } else {
            // Chunk count is fixed once set
            next.chunk_progress.resize(current.chunk_progress.len(), 0.0);
            for (value, previous) in next.chunk_progress.iter_mut().zip(&current.chunk_progress) {
                *value = clamp_progress(*value).max(*previous);
            }
        }

        record.snapshot = next.clone();
        Ok(next)
    }

    /// Record chunk progress and recompute overall progress.
    ///
    /// Returns `Ok(None)` when the update was a stale partial report for a
    /// frame that is already complete.
    pub fn report_chunk_progress(
        &self,
        job_id: &JobId,
        chunk_index: usize,
        update: ChunkUpdate,
    ) -> Result<Option<JobSnapshot>, RegistryError> {
        let entry = self.entry(job_id)?;
        let mut record = entry.lock();

        let count = record.snapshot.chunk_progress.len();
        if chunk_index >= count {
            return Err(RegistryError::ChunkOutOfRange {
                job_id: job_id.clone(),
                index: chunk_index,
                count,
            });
        }

        match update {
            ChunkUpdate::Partial { frame, .. } if frame < record.completed_frames[chunk_index] => {
                debug!(%job_id, chunk = chunk_index, frame, "Discarding stale partial progress");
                return Ok(None);
            }
            ChunkUpdate::Frames { done, .. } => {
                let completed = &mut record.completed_frames[chunk_index];
                *completed = (*completed).max(done);
            }
            ChunkUpdate::Partial { .. } => {}
        }

        let percent = update.percent();
        let committed = Self::commit(&mut record, job_id, |snapshot| {
            let previous = snapshot.chunk_progress[chunk_index];
            snapshot.chunk_progress[chunk_index] = clamp_progress(percent).max(previous);
            if snapshot.stage == Stage::Masking {
                snapshot.overall_progress = overall_from_chunks(&snapshot.chunk_progress);
            }
        })?;
        entry.updates.send_replace(committed.clone());
        Ok(Some(committed))
    }

    /// Remove jobs older than `max_age`. Returns the removed IDs.
    pub fn evict_expired(&self, max_age: Duration) -> Vec<JobId> {
        let now = Utc::now();
        let max_age = chrono::Duration::from_std(max_age)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100));

        let mut jobs = self.write_jobs();
        let expired: Vec<JobId> = jobs
            .iter()
            .filter(|(_, entry)| entry.lock().snapshot.age(now) > max_age)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            jobs.remove(id);
        }
        expired
    }

    /// Remove a job. Its progress streams end.
    pub fn remove(&self, job_id: &JobId) -> Option<JobSnapshot> {
        self.write_jobs()
            .remove(job_id)
            .map(|entry| entry.lock().snapshot.clone())
    }

    pub fn len(&self) -> usize {
        self.read_jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshots of all jobs, oldest first.
    pub fn list(&self) -> Vec<JobSnapshot> {
        let mut snapshots: Vec<JobSnapshot> = self
            .read_jobs()
            .values()
            .map(|entry| entry.lock().snapshot.clone())
            .collect();
        snapshots.sort_by_key(|s| s.created_at);
        snapshots
    }

    fn entry(&self, job_id: &JobId) -> Result<Arc<JobEntry>, RegistryError> {
        self.read_jobs()
            .get(job_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(job_id.clone()))
    }

    fn read_jobs(&self) -> std::sync::RwLockReadGuard<'_, HashMap<JobId, Arc<JobEntry>>> {
        self.jobs.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_jobs(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<JobId, Arc<JobEntry>>> {
        self.jobs.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn clamp_progress(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}
