use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

use crate::core::validation::ValidationError;

/// Centralized error types for the application
///
/// Everything that can fail before a response body starts streaming is
/// converted to this enum. Once an event stream is open, failures are reported
/// in-band as `ERROR:` messages instead.
#[derive(Error, Debug)]
pub enum AppError {
    /// Rejected user input (bad URL, missing query)
    #[error("Validation error: {0}")]
    Validation(String),

    /// The search provider failed or returned garbage
    #[error("Search error: {0}")]
    Search(String),

    /// An external process could not be run or misbehaved
    #[error("Process error: {0}")]
    Process(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// HTTP status used when the error reaches a handler.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to API clients: the inner text without the category prefix.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::Search(msg) | AppError::Process(msg) => msg.clone(),
            AppError::Io(e) => e.to_string(),
            AppError::Json(e) => e.to_string(),
            AppError::Anyhow(e) => e.to_string(),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::debug!("Request rejected: {}", self);
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
