//! HTTP and progress-stream metrics, exported in Prometheus format.

use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const HTTP_REQUESTS: &str = "vamos_http_requests_total";
pub const HTTP_LATENCY: &str = "vamos_http_request_duration_seconds";
pub const HTTP_RESPONSES: &str = "vamos_http_responses_total";
pub const HTTP_IN_FLIGHT: &str = "vamos_http_requests_in_flight";
pub const STREAMS_OPENED: &str = "vamos_progress_streams_total";
pub const STREAMS_ACTIVE: &str = "vamos_progress_streams_active";

/// Install the global recorder. Worker metrics go through the same recorder.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    Ok(PrometheusBuilder::new().install_recorder()?)
}

pub fn record_stream_opened() {
    counter!(STREAMS_OPENED).increment(1);
    gauge!(STREAMS_ACTIVE).increment(1.0);
}

pub fn record_stream_closed() {
    gauge!(STREAMS_ACTIVE).decrement(1.0);
}

/// Route template used as the `route` label, so job IDs never become
/// label values.
fn route_label(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

struct InFlight;

impl InFlight {
    fn enter() -> Self {
        gauge!(HTTP_IN_FLIGHT).increment(1.0);
        Self
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        gauge!(HTTP_IN_FLIGHT).decrement(1.0);
    }
}

/// Count and time every routed request.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let labels = [
        ("method", request.method().as_str().to_string()),
        ("route", route_label(&request)),
    ];
    let start = Instant::now();

    let response = {
        let _in_flight = InFlight::enter();
        next.run(request).await
    };

    let status = response.status().as_u16().to_string();
    counter!(HTTP_REQUESTS, &labels).increment(1);
    histogram!(HTTP_LATENCY, &labels).record(start.elapsed().as_secs_f64());
    counter!(HTTP_RESPONSES, "status" => status).increment(1);

    response
}
