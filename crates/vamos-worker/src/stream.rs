//! Live progress stream for one job.
//!
//! Emits the current state right away, then every change of at least
//! `min_delta` percentage points or of status. The stream ends after it has
//! emitted a terminal status, or when the job leaves the registry.
//! Dropping the stream has no effect on the job.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, Stream};
use tokio::sync::watch;
use vamos_models::{JobId, JobSnapshot, ProgressEvent};

use crate::registry::ProgressRegistry;

/// Stream tuning.
#[derive(Debug, Clone, Copy)]
pub struct StreamOptions {
    /// Fallback re-read interval when no change notification arrives
    pub poll_interval: Duration,
    /// Smallest progress change worth emitting
    pub min_delta: f64,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(300),
            min_delta: 0.1,
        }
    }
}

struct StreamState {
    registry: Arc<ProgressRegistry>,
    job_id: JobId,
    updates: Option<watch::Receiver<JobSnapshot>>,
    options: StreamOptions,
    last: Option<ProgressEvent>,
    finished: bool,
}

impl StreamState {
    fn should_emit(&self, event: &ProgressEvent) -> bool {
        match &self.last {
            None => true,
            Some(last) => {
                event.status != last.status
                    || (event.progress - last.progress).abs() >= self.options.min_delta
            }
        }
    }

    fn emit(mut self, event: ProgressEvent) -> Option<(ProgressEvent, Self)> {
        self.finished = event.is_terminal();
        self.last = Some(event.clone());
        Some((event, self))
    }
}

/// Progress events for `job_id`. Empty if the job is unknown.
pub fn progress_stream(
    registry: Arc<ProgressRegistry>,
    job_id: JobId,
    options: StreamOptions,
) -> impl Stream<Item = ProgressEvent> + Send + 'static {
    let updates = registry.subscribe(&job_id);
    let state = StreamState {
        registry,
        job_id,
        updates,
        options,
        last: None,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }

        if state.last.is_none() {
            let snapshot = state.registry.snapshot(&state.job_id)?;
            return state.emit(ProgressEvent::from(&snapshot));
        }

        loop {
            let updates = state.updates.as_mut()?;
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        // Sender dropped: the job was removed
                        return None;
                    }
                }
                _ = tokio::time::sleep(state.options.poll_interval) => {}
            }

            let snapshot = state.registry.snapshot(&state.job_id)?;
            let event = ProgressEvent::from(&snapshot);
            if state.should_emit(&event) {
                return state.emit(event);
            }
        }
    })
}
