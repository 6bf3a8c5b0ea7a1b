//! API routes.

use axum::middleware;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{create_job, get_job, health, job_progress, list_jobs, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, log_request, request_span};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let job_routes = Router::new()
        .route("/jobs", get(list_jobs).post(create_job))
        .route("/jobs/:job_id", get(get_job))
        .route("/jobs/:job_id/progress", get(job_progress));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", job_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .route_layer(middleware::from_fn(metrics_middleware))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(log_request))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use fake::FakeToolkit;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;
    use vamos_detect::PassthroughDetector;
    use vamos_worker::{JobCoordinator, ProgressRegistry, WorkerConfig};

    /// Toolkit for jobs that never get past input validation.
    mod fake {
        use std::path::{Path, PathBuf};
        use vamos_media::{MediaError, MediaResult, MediaToolkit};

        pub struct FakeToolkit;

        #[async_trait::async_trait]
        impl MediaToolkit for FakeToolkit {
            async fn split(&self, video: &Path, _: &Path, _: u32) -> MediaResult<Vec<PathBuf>> {
                Err(MediaError::FileNotFound(video.to_path_buf()))
            }

            async fn extract_frames(
                &self,
                chunk: &Path,
                _: &Path,
                _: u32,
            ) -> MediaResult<Vec<PathBuf>> {
                Err(MediaError::FileNotFound(chunk.to_path_buf()))
            }

            async fn encode(&self, frame_dir: &Path, _: &Path, _: u32) -> MediaResult<()> {
                Err(MediaError::NoFrames(frame_dir.to_path_buf()))
            }

            async fn concat(&self, _: &[PathBuf], _: &Path) -> MediaResult<()> {
                Err(MediaError::invalid_video("nothing to concatenate"))
            }
        }
    }

    fn app() -> (Router, Arc<ProgressRegistry>, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let worker = WorkerConfig {
            work_dir: dir.path().to_path_buf(),
            ..WorkerConfig::default()
        };
        let registry = Arc::new(ProgressRegistry::new());
        let coordinator = JobCoordinator::new(
            Arc::clone(&registry),
            Arc::new(FakeToolkit),
            Arc::new(PassthroughDetector),
            worker,
        );
        let state = AppState::with_coordinator(ApiConfig::default(), coordinator, None);
        (create_router(state, None), registry, dir)
    }

    fn post_job(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/jobs")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _dir) = app();
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("\"status\":\"healthy\""));
    }

    #[tokio::test]
    async fn test_create_job_is_accepted() {
        let (app, registry, _dir) = app();
        let response = app
            .oneshot(post_job(r#"{"video_path": "/uploads/in.mp4", "blur_mode": "box"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(response.headers().contains_key("x-request-id"));

        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        let job_id = body["job_id"].as_str().unwrap();
        assert!(registry.snapshot(&vamos_models::JobId::from_string(job_id)).is_some());
    }

    #[tokio::test]
    async fn test_create_job_rejects_empty_path() {
        let (app, _, _dir) = app();
        let response = app.oneshot(post_job(r#"{"video_path": "  "}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("validation_error"));
    }

    #[tokio::test]
    async fn test_create_job_rejects_malformed_json() {
        let (app, _, _dir) = app();
        let response = app.oneshot(post_job("{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let (app, _, _dir) = app();
        let response = app.clone().oneshot(get("/api/jobs/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.oneshot(get("/api/jobs/nope/progress")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_progress_stream_ends_with_terminal_event() {
        let (app, _, _dir) = app();
        let response = app
            .clone()
            .oneshot(post_job(r#"{"video_path": "/definitely/missing.mp4"}"#))
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        let job_id = body["job_id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(get(&format!("/api/jobs/{}/progress", job_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let text = tokio::time::timeout(std::time::Duration::from_secs(5), body_text(response))
            .await
            .unwrap();
        assert!(text.ends_with("data: 5.00,splitting,error\n\n"), "{:?}", text);

        let response = app.oneshot(get(&format!("/api/jobs/{}", job_id))).await.unwrap();
        let snapshot: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(snapshot["status"], "error");
        assert!(snapshot["error_message"]
            .as_str()
            .unwrap()
            .starts_with("InputError"));
    }
}
