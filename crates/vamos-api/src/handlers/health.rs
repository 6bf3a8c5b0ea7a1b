//! Liveness and readiness probes.

use std::future::Future;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use vamos_media::check_ffmpeg;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    /// Jobs currently held in the registry
    pub jobs: usize,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
        jobs: state.registry.len(),
    })
}

/// Outcome of one dependency probe.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Probe {
    Ok { latency_ms: u64 },
    Skipped,
    Error { error: String },
}

impl Probe {
    async fn timed<F>(check: F) -> Self
    where
        F: Future<Output = Result<(), String>>,
    {
        let start = Instant::now();
        match check.await {
            Ok(()) => Probe::Ok {
                latency_ms: start.elapsed().as_millis() as u64,
            },
            Err(error) => Probe::Error { error },
        }
    }

    fn failed(&self) -> bool {
        matches!(self, Probe::Error { .. })
    }
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub ffmpeg: Probe,
    pub detector: Probe,
}

/// GET /ready
///
/// 503 when FFmpeg is missing or a configured detector service does not
/// answer its health endpoint.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let ffmpeg =
        Probe::timed(async { check_ffmpeg().map(|_| ()).map_err(|e| e.to_string()) }).await;

    let detector = match &state.detector_service {
        Some(service) => {
            Probe::timed(async {
                if service.health_check().await {
                    Ok(())
                } else {
                    Err(format!("{} is not healthy", service.base_url()))
                }
            })
            .await
        }
        None => Probe::Skipped,
    };

    let degraded = ffmpeg.failed() || detector.failed();
    let status = if degraded {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(ReadinessResponse {
            status: if degraded { "degraded" } else { "ready" },
            ffmpeg,
            detector,
        }),
    )
}
