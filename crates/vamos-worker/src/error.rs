//! Worker error types.
//!
//! Failures are grouped by cause. The group label ([`WorkerError::kind`]) is
//! what a failed job records in its error message.

use thiserror::Error;
use vamos_media::MediaError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Missing or corrupt video, chunk or frame file
    #[error("{0}")]
    Input(String),

    /// Detector failure. Recovered per frame, never fails a job.
    #[error("{0}")]
    Detector(String),

    /// Split, extract, encode or concatenate failure
    #[error("{0}")]
    Encode(String),

    /// Unknown blur mode or malformed option
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Internal(String),
}

impl WorkerError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Taxonomy label.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::Input(_) => "InputError",
            WorkerError::Detector(_) => "DetectorError",
            WorkerError::Encode(_) => "EncodeError",
            WorkerError::Configuration(_) => "ConfigurationError",
            WorkerError::Internal(_) => "InternalError",
        }
    }

    /// Message stored on a failed job: `<kind>: <detail>`.
    pub fn job_message(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

impl From<MediaError> for WorkerError {
    fn from(e: MediaError) -> Self {
        if e.is_input_error() {
            WorkerError::Input(e.to_string())
        } else {
            WorkerError::Encode(e.to_string())
        }
    }
}

impl From<image::ImageError> for WorkerError {
    fn from(e: image::ImageError) -> Self {
        WorkerError::from(MediaError::from(e))
    }
}

impl From<vamos_detect::DetectError> for WorkerError {
    fn from(e: vamos_detect::DetectError) -> Self {
        WorkerError::Detector(e.to_string())
    }
}

impl From<vamos_models::UnknownBlurMode> for WorkerError {
    fn from(e: vamos_models::UnknownBlurMode) -> Self {
        WorkerError::Configuration(e.to_string())
    }
}
