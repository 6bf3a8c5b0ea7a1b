//! Wire types for the inference service.

use serde::{Deserialize, Serialize};
use vamos_models::{BoundingBox, Detection};

/// Response of `POST /detect`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Response of `POST /faces`: face boxes relative to the posted image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacesResponse {
    #[serde(default)]
    pub faces: Vec<BoundingBox>,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
