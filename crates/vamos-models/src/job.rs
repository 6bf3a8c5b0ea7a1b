//! Job definitions and lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the final artifact for this job.
    pub fn final_artifact_name(&self) -> String {
        format!("{}_final.mp4", self.0)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Job lifecycle status.
///
/// Transitions only move forward: `queued → processing → {done, error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Registered, pipeline not started yet
    #[default]
    Queued,
    /// Pipeline running
    Processing,
    /// Final artifact produced
    Done,
    /// Pipeline failed
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    /// Position along the lifecycle. Terminal states share the last rank.
    pub fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Processing => 1,
            JobStatus::Done | JobStatus::Error => 2,
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// A job only reaches `done` through `processing`; a queued job can
    /// only fail.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Queued, JobStatus::Done) => false,
            (current, next) if *current == next => !current.is_terminal(),
            (current, next) => !current.is_terminal() && next.rank() > current.rank(),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Human-readable pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Queued,
    Splitting,
    Masking,
    CombiningChunks,
    CombiningFinal,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Queued => "queued",
            Stage::Splitting => "splitting",
            Stage::Masking => "masking",
            Stage::CombiningChunks => "combining_chunks",
            Stage::CombiningFinal => "combining_final",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-job processing options supplied when a job is started.
///
/// Values are kept raw so that a malformed option fails the job itself
/// rather than the request that started it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobOptions {
    /// Blur transform name (`gaussian`, `box`, `bilateral`, `mosaic`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur_mode: Option<String>,
    /// Feather width in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feather_px: Option<i32>,
}

/// Snapshot of a job's state as held by the progress registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Job ID
    pub id: JobId,
    /// Lifecycle status
    pub status: JobStatus,
    /// Current phase
    pub stage: Stage,
    /// Overall progress in [0, 100]
    pub overall_progress: f64,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Progress per chunk in [0, 100], index aligned
    pub chunk_progress: Vec<f64>,
    /// Error message when status is `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Source video
    pub source_path: PathBuf,
    /// Final artifact, set once the job is done
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<PathBuf>,
}

impl JobSnapshot {
    /// Create a freshly queued job.
    pub fn new(id: JobId, source_path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            stage: Stage::Queued,
            overall_progress: 0.0,
            created_at: Utc::now(),
            chunk_progress: Vec::new(),
            error_message: None,
            source_path: source_path.into(),
            result_path: None,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Age of the job relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Error));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Done));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Done));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Queued));
        assert!(!JobStatus::Done.can_transition_to(JobStatus::Error));
        assert!(!JobStatus::Error.can_transition_to(JobStatus::Error));
    }

    #[test]
    fn test_stage_serialization() {
        let json = serde_json::to_string(&Stage::CombiningChunks).unwrap();
        assert_eq!(json, "\"combining_chunks\"");
        assert_eq!(Stage::CombiningFinal.to_string(), "combining_final");
    }

    #[test]
    fn test_final_artifact_name() {
        let id = JobId::from_string("abc");
        assert_eq!(id.final_artifact_name(), "abc_final.mp4");
    }

    #[test]
    fn test_new_snapshot_is_queued() {
        let snapshot = JobSnapshot::new(JobId::new(), "/tmp/in.mp4");
        assert_eq!(snapshot.status, JobStatus::Queued);
        assert_eq!(snapshot.stage, Stage::Queued);
        assert_eq!(snapshot.overall_progress, 0.0);
        assert!(snapshot.chunk_progress.is_empty());
        assert!(!snapshot.is_terminal());
    }
}
