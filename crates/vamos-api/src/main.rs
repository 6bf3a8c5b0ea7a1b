//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vamos_api::{create_router, metrics, ApiConfig, AppState};
use vamos_worker::{JobReaper, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting vamos-api");
    if let Err(e) = run().await {
        error!("vamos-api stopped: {:#}", e);
        std::process::exit(1);
    }
    info!("vamos-api shut down");
}

/// `LOG_FORMAT=json` for machine-readable logs; `RUST_LOG` filters, with
/// the vamos crates at `info` unless overridden.
fn init_tracing() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "vamos=info".parse() {
        filter = filter.add_directive(directive);
    }

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    info!(
        work_dir = %worker_config.work_dir.display(),
        segment_seconds = worker_config.segment_seconds,
        max_workers = worker_config.max_workers,
        "Configuration loaded"
    );

    tokio::fs::create_dir_all(&worker_config.work_dir).await?;

    let state = AppState::new(config.clone(), worker_config.clone())?;

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics()?)
    } else {
        None
    };

    let reaper = JobReaper::new(Arc::clone(&state.registry), &worker_config);
    tokio::spawn(async move {
        reaper.run().await;
    });

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for Ctrl+C, running until killed: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested, draining connections");
}
