//! Detector errors.

use thiserror::Error;

pub type DetectResult<T> = Result<T, DetectError>;

#[derive(Debug, Error)]
pub enum DetectError {
    /// 5xx or 429 from the inference service; worth another attempt.
    #[error("detector service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Any other non-success status.
    #[error("detector rejected the request: {0}")]
    RequestFailed(String),

    #[error("unexpected detector response: {0}")]
    InvalidResponse(String),

    #[error("detector transport: {0}")]
    Network(#[from] reqwest::Error),

    #[error("could not encode frame for upload: {0}")]
    Encode(#[from] image::ImageError),

    /// The blocking client was built outside a tokio runtime.
    #[error("detector has no runtime: {0}")]
    NoRuntime(String),
}

impl DetectError {
    /// Overloaded services and dropped connections are retried; anything
    /// the service rejected outright is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ServiceUnavailable(_) => true,
            Self::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(DetectError::ServiceUnavailable("503".into()).is_retryable());
        assert!(!DetectError::RequestFailed("400".into()).is_retryable());
        assert!(!DetectError::InvalidResponse("bad".into()).is_retryable());
        assert!(!DetectError::NoRuntime("none".into()).is_retryable());
    }
}
