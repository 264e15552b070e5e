use crate::services::{album_service::AlbumError, migration::MigrationError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

// Store failures reach the client as a generic message; the cause is logged.

impl From<AlbumError> for AppError {
    fn from(err: AlbumError) -> Self {
        match err {
            AlbumError::InvalidArgument(msg) => AppError::bad_request(msg),
            AlbumError::StoreUnavailable(cause) => {
                tracing::error!(error = %cause, "album request failed");
                AppError::internal("Object store request failed")
            }
        }
    }
}

impl From<MigrationError> for AppError {
    fn from(err: MigrationError) -> Self {
        match err {
            MigrationError::InvalidArgument(msg) => AppError::bad_request(msg),
            MigrationError::StoreUnavailable(cause) => {
                tracing::error!(error = %cause, "change storage class failed");
                AppError::internal("Failed to change storage class")
            }
        }
    }
}
