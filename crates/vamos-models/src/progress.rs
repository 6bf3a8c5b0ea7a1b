//! Progress stream events.

use serde::{Deserialize, Serialize};

use crate::job::{JobSnapshot, JobStatus, Stage};

/// One progress update delivered to a stream consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub progress: f64,
    pub stage: Stage,
    pub status: JobStatus,
}

impl ProgressEvent {
    /// `<progress>,<stage>,<status>` with two-digit progress precision.
    pub fn payload(&self) -> String {
        format!("{:.2},{},{}", self.progress, self.stage, self.status)
    }

    /// Full wire line: `data: <payload>\n\n`.
    pub fn to_wire(&self) -> String {
        format!("data: {}\n\n", self.payload())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl From<&JobSnapshot> for ProgressEvent {
    fn from(snapshot: &JobSnapshot) -> Self {
        Self {
            progress: snapshot.overall_progress,
            stage: snapshot.stage,
            status: snapshot.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let event = ProgressEvent {
            progress: 52.5,
            stage: Stage::Masking,
            status: JobStatus::Processing,
        };
        assert_eq!(event.to_wire(), "data: 52.50,masking,processing\n\n");
        assert!(!event.is_terminal());

        let done = ProgressEvent {
            progress: 100.0,
            stage: Stage::Done,
            status: JobStatus::Done,
        };
        assert_eq!(done.payload(), "100.00,done,done");
        assert!(done.is_terminal());
    }
}
