// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unknown account: {0}")]
    UnknownTenant(String),

    #[error("Invalid webhook signature for account {0}")]
    InvalidSignature(String),

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Origin not allowed: {0}")]
    OriginNotAllowed(String),

    #[error("Malformed input: {0}")]
    MalformedInput(#[from] serde_json::Error),

    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::UnknownTenant(_) | AppError::InvalidSignature(_) | AppError::InvalidPassword => {
                StatusCode::UNAUTHORIZED
            },
            AppError::OriginNotAllowed(_) => StatusCode::FORBIDDEN,
            AppError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::UnknownTenant(_) => "AUTH_001",
            AppError::InvalidSignature(_) => "AUTH_002",
            AppError::InvalidPassword => "AUTH_003",
            AppError::OriginNotAllowed(_) => "AUTH_004",
            AppError::MalformedInput(_) => "VAL_001",
            AppError::Directory(_) => "DIR_001",
            AppError::Config(_) => "CFG_001",
            AppError::Io(_) => "IO_001",
            AppError::Internal(_) => "INT_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::UnknownTenant(_) | AppError::InvalidSignature(_) | AppError::InvalidPassword => {
                "Authentication failed".to_string()
            },
            AppError::OriginNotAllowed(_) => "Origin not allowed".to_string(),
            AppError::MalformedInput(_) => "Invalid request format".to_string(),
            AppError::Directory(_) | AppError::Config(_) | AppError::Io(_) | AppError::Internal(_) => {
                "An internal server error occurred".to_string()
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // Detailed messages in debug builds only
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
