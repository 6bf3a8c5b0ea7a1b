//! Job handlers: submission, snapshots and live progress.

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::info;
use vamos_models::{JobId, JobOptions, JobSnapshot, ProgressEvent};
use vamos_worker::progress_stream;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Job submission request.
#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    /// Path of an uploaded video on the server
    pub video_path: String,
    /// Blur transform; resolved when masking starts
    #[serde(default)]
    pub blur_mode: Option<String>,
    #[serde(default)]
    pub feather_px: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateJobResponse {
    pub job_id: JobId,
}

/// POST /api/jobs
pub async fn create_job(
    State(state): State<AppState>,
    payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    let Json(request) = payload?;

    let video_path = request.video_path.trim();
    if video_path.is_empty() {
        return Err(ApiError::validation("video_path must not be empty"));
    }

    let options = JobOptions {
        blur_mode: request.blur_mode,
        feather_px: request.feather_px,
    };
    let job_id = state
        .coordinator
        .start_job(PathBuf::from(video_path), options);

    info!(job_id = %job_id, video_path, "Job accepted");

    Ok((StatusCode::ACCEPTED, Json(CreateJobResponse { job_id })))
}

/// GET /api/jobs
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobSnapshot>> {
    Json(state.registry.list())
}

/// GET /api/jobs/:job_id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let job_id = JobId::from_string(job_id);
    state
        .registry
        .snapshot(&job_id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("job {}", job_id)))
}

/// GET /api/jobs/:job_id/progress
///
/// Server-Sent Events, one `data: <progress>,<stage>,<status>` event per
/// update. The stream closes after the terminal event. Disconnecting does
/// not affect the job.
pub async fn job_progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let job_id = JobId::from_string(job_id);
    if state.registry.snapshot(&job_id).is_none() {
        return Err(ApiError::not_found(format!("job {}", job_id)));
    }

    let tracker = StreamTracker::open();
    let events = progress_stream(
        Arc::clone(&state.registry),
        job_id,
        state.config.stream_options(),
    )
    .map(move |event| Ok(tracker.event(&event)));

    Ok(Sse::new(events))
}

/// Keeps the active-stream gauge accurate however the stream ends.
struct StreamTracker;

impl StreamTracker {
    fn open() -> Self {
        metrics::record_stream_opened();
        Self
    }

    fn event(&self, event: &ProgressEvent) -> Event {
        Event::default().data(event.payload())
    }
}

impl Drop for StreamTracker {
    fn drop(&mut self) {
        metrics::record_stream_closed();
    }
}
