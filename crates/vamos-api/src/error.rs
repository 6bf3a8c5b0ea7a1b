//! Error responses of the job API.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(String),

    /// Well-formed request with unacceptable values.
    #[error("{0}")]
    Validation(String),

    /// Body that could not be read as the expected JSON.
    #[error(transparent)]
    Rejected(#[from] JsonRejection),
}

impl ApiError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            // Missing content type is 415, syntax errors 400
            Self::Rejected(rejection) => (rejection.status(), "bad_request"),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let detail = match &self {
            Self::Rejected(rejection) => rejection.body_text(),
            other => other.to_string(),
        };
        (status, Json(ErrorBody { detail, code })).into_response()
    }
}
