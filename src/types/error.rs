//! Error types for Northstar
//!
//! One error enum shared by the store, the services, the HTTP layer and the
//! offline client. `status_code()` decides how an error is surfaced over HTTP.

use hyper::StatusCode;
use serde_json::json;

use super::validation::FieldErrors;

/// Main error type for Northstar operations
#[derive(Debug, thiserror::Error)]
pub enum NorthstarError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Error reported by a remote Northstar server (offline sync client side).
    /// `status` is 0 when the request never produced a response.
    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },
}

impl NorthstarError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::QuotaExceeded(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Remote { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Machine-readable error code included in JSON bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            Self::Database(_) | Self::Internal(_) | Self::Config(_) => "INTERNAL_ERROR",
            Self::Remote { .. } => "REMOTE_ERROR",
        }
    }

    /// True for failures the caller cannot fix (logged server-side, generic body)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// JSON body for an HTTP error response.
    ///
    /// Server errors never leak their cause; it is logged instead.
    pub fn to_body(&self) -> serde_json::Value {
        match self {
            _ if self.is_server_error() => json!({
                "error": "Internal server error",
                "code": self.code(),
            }),
            Self::Validation(fields) => json!({
                "error": "Validation failed",
                "code": self.code(),
                "fields": fields,
            }),
            Self::BadRequest(msg)
            | Self::Unauthorized(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::QuotaExceeded(msg) => json!({
                "error": msg,
                "code": self.code(),
            }),
            _ => json!({
                "error": self.to_string(),
                "code": self.code(),
            }),
        }
    }
}

impl From<FieldErrors> for NorthstarError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<std::io::Error> for NorthstarError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for NorthstarError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for NorthstarError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<rusqlite::Error> for NorthstarError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for NorthstarError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthorized(format!("JWT error: {}", err))
    }
}

impl From<reqwest::Error> for NorthstarError {
    fn from(err: reqwest::Error) -> Self {
        Self::Remote {
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            message: err.to_string(),
        }
    }
}

/// Result type alias for Northstar operations
pub type Result<T> = std::result::Result<T, NorthstarError>;
