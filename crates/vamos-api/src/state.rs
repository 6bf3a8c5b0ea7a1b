//! Application state.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use vamos_detect::{Detector, PassthroughDetector, ServiceDetector};
use vamos_media::{check_ffmpeg, check_ffprobe, FfmpegToolkit, MediaToolkit};
use vamos_worker::{JobCoordinator, ProgressRegistry, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub coordinator: JobCoordinator,
    pub registry: Arc<ProgressRegistry>,
    /// Remote detector, probed by the readiness check
    pub detector_service: Option<Arc<ServiceDetector>>,
}

impl AppState {
    /// Create application state backed by FFmpeg and, when `DETECTOR_URL` is
    /// set, the remote inference service.
    pub fn new(config: ApiConfig, worker: WorkerConfig) -> anyhow::Result<Self> {
        let ffmpeg = check_ffmpeg().context("ffmpeg is required")?;
        let ffprobe = check_ffprobe().context("ffprobe is required")?;
        info!("Using {} and {}", ffmpeg.display(), ffprobe.display());

        let mut detector_service = None;
        let detector: Arc<dyn Detector> = if std::env::var("DETECTOR_URL").is_ok() {
            let service =
                Arc::new(ServiceDetector::from_env().context("failed to create detector client")?);
            info!("Detector service at {}", service.base_url());
            detector_service = Some(Arc::clone(&service));
            service
        } else {
            warn!("DETECTOR_URL not set, frames will pass through unredacted");
            Arc::new(PassthroughDetector)
        };

        let toolkit: Arc<dyn MediaToolkit> = match worker.ffmpeg_timeout {
            Some(timeout) => Arc::new(FfmpegToolkit::with_timeout(timeout.as_secs())),
            None => Arc::new(FfmpegToolkit::new()),
        };

        let registry = Arc::new(ProgressRegistry::new());
        let coordinator = JobCoordinator::new(Arc::clone(&registry), toolkit, detector, worker);

        Ok(Self::with_coordinator(config, coordinator, detector_service))
    }

    /// Create state around an existing coordinator.
    pub fn with_coordinator(
        config: ApiConfig,
        coordinator: JobCoordinator,
        detector_service: Option<Arc<ServiceDetector>>,
    ) -> Self {
        Self {
            config,
            registry: Arc::clone(coordinator.registry()),
            coordinator,
            detector_service,
        }
    }
}
