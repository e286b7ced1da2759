use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Every failure a request can end in.
///
/// The `Display` output carries full detail and is meant for the logs only.
/// Callers get the generic text of [`AppError::public_message`].
#[derive(Debug, Error)]
pub enum AppError {
    #[error("container {target} not found")]
    NotFound { target: String },

    #[error("container runtime unavailable: {0:#}")]
    RuntimeUnavailable(#[source] anyhow::Error),

    #[error("container runtime error: {0:#}")]
    Runtime(#[source] anyhow::Error),

    #[error("container runtime did not answer {operation} within {after:?}")]
    RuntimeTimeout { operation: &'static str, after: Duration },

    #[error("malformed filter source: {0}")]
    MalformedFilterSource(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::RuntimeTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::MalformedFilterSource(_) => StatusCode::BAD_REQUEST,
            AppError::RuntimeUnavailable(_) | AppError::Runtime(_) | AppError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    pub fn public_message(&self) -> &'static str {
        match self {
            AppError::NotFound { .. } => "Container not found.",
            AppError::RuntimeTimeout { .. } => "The container runtime did not respond in time.",
            AppError::MalformedFilterSource(_) => "The uploaded CSV could not be used as a filter.",
            AppError::RuntimeUnavailable(_) | AppError::Runtime(_) | AppError::Io(_) => {
                "Internal server error."
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "message": self.public_message() }))).into_response()
    }
}
