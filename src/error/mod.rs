//! Error handling for the key pool service.
//!
//! The pool itself never fails: unknown keys are ignored and exhaustion is
//! signalled with `None`. Everything that can fail around it (configuration,
//! upstream calls made through the gateway helper, the HTTP surface) reports
//! through [`AppError`], which renders as an RFC 7807 problem document.

pub mod types;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

/// Standard error response format following RFC 7807 Problem Details
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// A URI reference that identifies the problem type
    #[serde(rename = "type")]
    pub error_type: String,

    /// A short, human-readable summary of the problem type
    pub title: String,

    /// The HTTP status code
    pub status: u16,

    /// A human-readable explanation specific to this occurrence
    pub detail: String,

    /// A URI reference that identifies the specific occurrence
    pub instance: String,

    /// Request ID for tracing
    pub request_id: Option<String>,
}

#[derive(Error, Debug)]
pub enum AppError {
    // Configuration errors
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String, line: Option<usize> },

    // Key pool errors
    #[error("Unknown provider: {provider}")]
    UnknownProvider { provider: String },

    #[error("No API keys available for provider: {provider}")]
    NoAvailableKeys { provider: String },

    #[error("Upstream request to {provider} failed: {message}")]
    Upstream {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    // System errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("IO operation failed: {operation} - {message}")]
    Io { operation: String, message: String },
}

impl AppError {
    /// Create a new configuration validation error
    pub fn config_validation(message: impl Into<String>, field: Option<impl Into<String>>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
            field: field.map(Into::into),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ConfigParse { .. } | Self::Serialization { .. } => StatusCode::BAD_REQUEST,

            Self::ConfigNotFound { .. } | Self::UnknownProvider { .. } => StatusCode::NOT_FOUND,

            Self::ConfigValidation { .. } | Self::Io { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,

            // Every key of the provider is rate-limited or circuit-broken.
            Self::NoAvailableKeys { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error type URI for RFC 7807 compliance
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::ConfigValidation { .. } | Self::ConfigNotFound { .. } | Self::ConfigParse { .. } => {
                "https://key-pool.dev/errors/configuration"
            }
            Self::UnknownProvider { .. } | Self::NoAvailableKeys { .. } => {
                "https://key-pool.dev/errors/key-management"
            }
            Self::Upstream { .. } => "https://key-pool.dev/errors/upstream",
            _ => "https://key-pool.dev/errors/internal",
        }
    }

    /// Get a human-readable title for the error
    pub fn title(&self) -> &'static str {
        match self {
            Self::ConfigValidation { .. } | Self::ConfigNotFound { .. } | Self::ConfigParse { .. } => {
                "Configuration Error"
            }
            Self::UnknownProvider { .. } => "Unknown Provider",
            Self::NoAvailableKeys { .. } => "Key Pool Exhausted",
            Self::Upstream { .. } => "Upstream Error",
            _ => "Internal Server Error",
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self, request_id: Option<&str>) {
        let request_id = request_id.unwrap_or("unknown");

        if self.status_code().is_server_error() {
            error!(
                error = %self,
                request_id = request_id,
                error_type = self.error_type(),
                "Application error occurred"
            );
        } else {
            warn!(
                error = %self,
                request_id = request_id,
                error_type = self.error_type(),
                "Client error occurred"
            );
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();

        self.log(Some(&request_id));

        let status = self.status_code();
        let error_response = ErrorResponse {
            error_type: self.error_type().to_string(),
            title: self.title().to_string(),
            status: status.as_u16(),
            detail: self.to_string(),
            instance: format!("/errors/{request_id}"),
            request_id: Some(request_id),
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for the application
pub type Result<T, E = AppError> = std::result::Result<T, E>;
