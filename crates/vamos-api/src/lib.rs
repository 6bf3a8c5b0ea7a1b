//! HTTP front end for redaction jobs: submission, snapshots, live
//! progress over Server-Sent Events, probes and Prometheus metrics.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
