//! Error handling module

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Uniform error raised by every telemetry API query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("HTTP {status} from {endpoint}")]
    Http { endpoint: String, status: u16 },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("API error from {endpoint}: {message}")]
    Remote { endpoint: String, message: String },

    #[error("Malformed response from {endpoint}: {message}")]
    Malformed { endpoint: String, message: String },
}

/// A refresh cycle that could not produce a snapshot
#[derive(Error, Debug, Clone)]
pub enum UpdateFailed {
    #[error("Error fetching data: {0}")]
    Api(#[from] ApiError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Account setup outcome that the host should retry later
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Update failed: {0}")]
    UpdateFailed(#[from] UpdateFailed),

    #[error("Upstream error: {0}")]
    Upstream(#[from] ApiError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::UpdateFailed(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            AppError::Upstream(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
