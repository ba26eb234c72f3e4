//! Application error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not signed in")]
    Unauthorized,

    #[error("Invalid code")]
    InvalidCode,

    #[error("Code expired")]
    CodeExpired,

    #[error("Gmail account not connected")]
    GmailNotConnected,

    #[error("Not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Not signed in"),
            AppError::InvalidCode => (StatusCode::BAD_REQUEST, "Invalid code"),
            AppError::CodeExpired => (StatusCode::BAD_REQUEST, "Code expired"),
            AppError::GmailNotConnected => {
                (StatusCode::BAD_REQUEST, "Gmail account not connected")
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found"),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::Provider(msg) => {
                tracing::error!("Provider error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Provider request failed")
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}
