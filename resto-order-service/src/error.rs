use axum::{http::StatusCode, response::Json};
use serde_json::json;

use resto_core::error::Error;

/// HTTP-facing failure shape. Validation failures carry field detail; every
/// other failure is opaque so store and broker internals never leak.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<String>),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal server error")]
    Internal,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(details) => ApiError::Validation(details),
            Error::WorkerAlreadyOnline | Error::AlreadyCooking => {
                ApiError::Conflict(err.to_string())
            }
            Error::Persistence(_) | Error::Publish(_) => ApiError::Internal,
        }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ApiError::Validation(details) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "validation failed",
                    "details": details,
                })),
            ),
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(json!({ "error": message })))
            }
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal server error" })),
            ),
        };

        (status, body).into_response()
    }
}
