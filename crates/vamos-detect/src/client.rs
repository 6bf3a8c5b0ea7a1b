//! Inference service HTTP client.

use std::future::Future;
use std::io::Cursor;
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use reqwest::{Client, Response, StatusCode};
use tokio::runtime::Handle;
use tracing::{debug, warn};
use vamos_models::{BoundingBox, Detection};

use crate::detector::Detector;
use crate::error::{DetectError, DetectResult};
use crate::types::{DetectResponse, FacesResponse, HealthResponse};

/// JPEG quality of frames posted to the service.
const UPLOAD_QUALITY: u8 = 90;

/// Configuration for the detector client.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Base URL of the inference service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

impl DetectorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("DETECTOR_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout: Duration::from_secs(
                std::env::var("DETECTOR_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            max_retries: std::env::var("DETECTOR_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }
}

/// Detector backed by a remote inference service.
///
/// Requests run on the runtime captured at construction, so the blocking
/// [`Detector`] methods may be called from `spawn_blocking` threads but not
/// from inside an async task.
pub struct ServiceDetector {
    http: Client,
    config: DetectorConfig,
    runtime: Handle,
}

impl ServiceDetector {
    /// Create a new client bound to the current tokio runtime.
    pub fn new(config: DetectorConfig) -> DetectResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| DetectError::NoRuntime(e.to_string()))?;
        Self::with_runtime(config, runtime)
    }

    /// Create a new client that runs its requests on `runtime`.
    pub fn with_runtime(config: DetectorConfig, runtime: Handle) -> DetectResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(DetectError::Network)?;

        Ok(Self {
            http,
            config,
            runtime,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> DetectResult<Self> {
        Self::new(DetectorConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Check if the inference service is healthy.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<HealthResponse>().await {
                    Ok(health) => health.status == "healthy" || health.status == "ok",
                    Err(e) => {
                        warn!("Detector health response unreadable: {}", e);
                        false
                    }
                }
            }
            Ok(response) => {
                warn!("Detector health check failed: {}", response.status());
                false
            }
            Err(e) => {
                warn!("Detector health check error: {}", e);
                false
            }
        }
    }

    /// Detect regions in a frame.
    pub async fn detect_async(&self, frame: &RgbImage) -> DetectResult<Vec<Detection>> {
        let body = encode_jpeg(frame)?;
        let response: DetectResponse = self.post_image("detect", body).await?;
        debug!(count = response.detections.len(), "Detector returned regions");
        Ok(response.detections)
    }

    /// Find faces inside a region crop.
    pub async fn refine_faces_async(&self, region: &RgbImage) -> DetectResult<Vec<BoundingBox>> {
        let body = encode_jpeg(region)?;
        let response: FacesResponse = self.post_image("faces", body).await?;
        Ok(response.faces)
    }

    async fn post_image<T>(&self, endpoint: &str, body: Vec<u8>) -> DetectResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.config.base_url, endpoint);

        let response = self
            .with_retry(|| async {
                let response = self
                    .http
                    .post(&url)
                    .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
                    .body(body.clone())
                    .send()
                    .await
                    .map_err(DetectError::Network)?;
                check_status(response).await
            })
            .await?;

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            DetectError::InvalidResponse(format!("{} response did not parse: {}", endpoint, e))
        })
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> DetectResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = DetectResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Detector request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| DetectError::RequestFailed("Unknown error".to_string())))
    }
}

impl Detector for ServiceDetector {
    fn detect(&self, frame: &RgbImage) -> DetectResult<Vec<Detection>> {
        self.runtime.block_on(self.detect_async(frame))
    }

    fn refine_faces(&self, region: &RgbImage) -> DetectResult<Vec<BoundingBox>> {
        self.runtime.block_on(self.refine_faces_async(region))
    }

    fn name(&self) -> &'static str {
        "service"
    }
}

async fn check_status(response: Response) -> DetectResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("Detector returned {}: {}", status, body);
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(DetectError::ServiceUnavailable(message))
    } else {
        Err(DetectError::RequestFailed(message))
    }
}

fn encode_jpeg(frame: &RgbImage) -> DetectResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    frame.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, UPLOAD_QUALITY))?;
    Ok(buffer.into_inner())
}
