//! Error types for emo-fusion

use crate::orchestrator::OrchestrationError;
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload exceeds the body limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Request carried no usable modality (400)
    #[error("{0}")]
    NoModality(String),

    /// Every analyzer call failed (500)
    #[error("{0}")]
    AllModalitiesFailed(String),

    /// Fusion could not produce a result (500)
    #[error("{0}")]
    Fusion(String),
}

impl From<OrchestrationError> for ApiError {
    fn from(err: OrchestrationError) -> Self {
        let message = err.to_string();
        match err {
            OrchestrationError::NoModalityProvided => ApiError::NoModality(message),
            OrchestrationError::AllModalitiesFailed(_) => ApiError::AllModalitiesFailed(message),
            OrchestrationError::Fusion(_) => ApiError::Fusion(message),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(format!("malformed multipart body: {}", err.body_text()))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            ApiError::NoModality(msg) => (StatusCode::BAD_REQUEST, "NO_MODALITY", msg),
            ApiError::AllModalitiesFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ALL_MODALITIES_FAILED",
                msg,
            ),
            ApiError::Fusion(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "FUSION_FAILED", msg),
        };

        // `detail` mirrors the message for clients reading a flat error field
        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            },
            "detail": message,
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
