use crate::engine::EngineError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API-boundary error. Always rendered as a typed JSON body so the UI can
/// tell a retryable upstream outage from a bad request.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidRange(msg) => AppError::BadRequest(msg),
            EngineError::SourceUnavailable(msg) => AppError::SourceUnavailable(msg),
            EngineError::ConsistencyViolation(msg) => AppError::ConsistencyViolation(msg),
            EngineError::Cache(msg) | EngineError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::SourceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "source_unavailable", msg)
            }
            AppError::ConsistencyViolation(msg) => {
                (StatusCode::CONFLICT, "consistency_violation", msg)
            }
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
        };

        let body = Json(json!({
            "error": message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}
