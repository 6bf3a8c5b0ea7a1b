//! Cross-cutting HTTP layers.

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, Response};
use axum::middleware::Next;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::RequestId;
use tracing::{info, info_span, Span};

/// Paths polled by orchestrators; not worth a log line each.
const QUIET_PATHS: [&str; 3] = ["/health", "/ready", "/metrics"];

/// CORS for the job API. `*` in the origin list allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::CACHE_CONTROL])
        .max_age(Duration::from_secs(600))
}

/// Span for one request, tagged with the id assigned by `SetRequestIdLayer`.
pub fn request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("-");

    info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id,
    )
}

/// Logs one line per completed request.
///
/// Progress streams are logged when their headers go out, not when they end.
pub async fn log_request(request: Request<Body>, next: Next) -> Response<Body> {
    let quiet = QUIET_PATHS.contains(&request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    if !quiet {
        info!(
            status = response.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
    }

    response
}
