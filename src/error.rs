//! Error types for the RapidX site service
//!
//! This module provides the crate error enum, structured error codes, and
//! production-safe logging/API formatting helpers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for site operations
pub type Result<T> = std::result::Result<T, SiteError>;

/// Error types for site operations
#[derive(Error, Debug)]
pub enum SiteError {
    /// Credential rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Admin session deadline passed
    #[error("Session expired, please reauthenticate")]
    SessionExpired,

    /// Persisted key/value store could not be read or written
    #[error("State store unavailable: {0}")]
    StoreUnavailable(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(String),

    /// Content service could not be reached
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Not found errors (projects, posts, etc.)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Structured error code for machine-readable error handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Authentication errors (1100-1199)
    InvalidCredentials,
    AuthenticationExpired,

    // Configuration errors (1200-1299)
    ConfigurationInvalid,

    // Data errors (1400-1499)
    ParsingFailed,
    InvalidInput,
    ContentNotFound,

    // Service errors (1600-1699)
    ServiceUnavailable,
    StorageUnavailable,
    DatabaseFailure,

    // Internal errors (1900-1999)
    InternalError,
}

impl ErrorCode {
    /// Get numeric error code
    pub fn as_number(&self) -> u32 {
        match self {
            ErrorCode::InvalidCredentials => 1101,
            ErrorCode::AuthenticationExpired => 1102,

            ErrorCode::ConfigurationInvalid => 1201,

            ErrorCode::ParsingFailed => 1401,
            ErrorCode::InvalidInput => 1402,
            ErrorCode::ContentNotFound => 1403,

            ErrorCode::ServiceUnavailable => 1601,
            ErrorCode::StorageUnavailable => 1602,
            ErrorCode::DatabaseFailure => 1603,

            ErrorCode::InternalError => 1901,
        }
    }

    /// Get error category
    pub fn category(&self) -> &'static str {
        match self.as_number() {
            1100..=1199 => "authentication",
            1200..=1299 => "configuration",
            1400..=1499 => "data",
            1600..=1699 => "service",
            1900..=1999 => "internal",
            _ => "unknown",
        }
    }
}

/// Error severity levels for log routing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl SiteError {
    /// Create an authentication error
    pub fn authentication<S: Into<String>>(msg: S) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a state store error
    pub fn store_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a database error
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a service unavailable error
    pub fn service_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Map error to structured error code
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            SiteError::Authentication(_) => ErrorCode::InvalidCredentials,
            SiteError::SessionExpired => ErrorCode::AuthenticationExpired,
            SiteError::StoreUnavailable(_) => ErrorCode::StorageUnavailable,
            SiteError::Config(_) => ErrorCode::ConfigurationInvalid,
            SiteError::Database(_) => ErrorCode::DatabaseFailure,
            SiteError::ServiceUnavailable(_) => ErrorCode::ServiceUnavailable,
            SiteError::NotFound(_) => ErrorCode::ContentNotFound,
            SiteError::InvalidInput(_) => ErrorCode::InvalidInput,
            SiteError::Json(_) => ErrorCode::ParsingFailed,
            SiteError::Io(_) => ErrorCode::InternalError,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SiteError::Authentication(_) | SiteError::SessionExpired => ErrorSeverity::Warning,
            SiteError::ServiceUnavailable(_) | SiteError::StoreUnavailable(_) => {
                ErrorSeverity::Warning
            }
            SiteError::NotFound(_) | SiteError::InvalidInput(_) => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SiteError::ServiceUnavailable(_)
                | SiteError::Database(_)
                | SiteError::StoreUnavailable(_)
        )
    }

    /// Check if error indicates authentication issue
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            SiteError::Authentication(_) | SiteError::SessionExpired
        )
    }

    /// Get a production-safe error message that doesn't expose internals
    pub fn sanitized_message(&self) -> String {
        match self {
            SiteError::Authentication(_) => "Authentication failed".to_string(),
            SiteError::SessionExpired => "Session expired, please reauthenticate".to_string(),
            SiteError::StoreUnavailable(_) => "Session storage unavailable".to_string(),
            SiteError::Config(_) => "Configuration error".to_string(),
            SiteError::Database(_) | SiteError::ServiceUnavailable(_) => {
                "Content service temporarily unavailable, please retry".to_string()
            }
            SiteError::NotFound(what) => format!("Not found: {what}"),
            SiteError::InvalidInput(reason) => format!("Invalid input: {reason}"),
            SiteError::Json(_) => "Data parsing error".to_string(),
            SiteError::Io(_) => "Internal error occurred".to_string(),
        }
    }
}

/// Error logging and reporting utilities
pub struct ErrorReporter;

impl ErrorReporter {
    /// Log an error with fields derived from its code and severity
    pub fn log_error(error: &SiteError, component: &str, operation: &str) {
        let code = error.to_error_code();
        match error.severity() {
            ErrorSeverity::Critical | ErrorSeverity::Error => {
                tracing::error!(
                    error_code = code.as_number(),
                    category = code.category(),
                    component,
                    operation,
                    retryable = error.is_retryable(),
                    "{}",
                    error
                );
            }
            ErrorSeverity::Warning => {
                tracing::warn!(
                    error_code = code.as_number(),
                    category = code.category(),
                    component,
                    operation,
                    retryable = error.is_retryable(),
                    "{}",
                    error
                );
            }
            ErrorSeverity::Info => {
                tracing::info!(
                    error_code = code.as_number(),
                    category = code.category(),
                    component,
                    operation,
                    "{}",
                    error
                );
            }
        }
    }

    /// Format error for API responses
    pub fn format_api_error(error: &SiteError) -> serde_json::Value {
        let code = error.to_error_code();
        serde_json::json!({
            "error": {
                "code": code.as_number(),
                "category": code.category(),
                "message": error.sanitized_message(),
                "retryable": error.is_retryable(),
            }
        })
    }
}

impl From<config::ConfigError> for SiteError {
    fn from(err: config::ConfigError) -> Self {
        SiteError::Config(err.to_string())
    }
}

#[cfg(feature = "http-server")]
impl axum::response::IntoResponse for SiteError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            SiteError::Authentication(_) | SiteError::SessionExpired => StatusCode::UNAUTHORIZED,
            SiteError::NotFound(_) => StatusCode::NOT_FOUND,
            SiteError::InvalidInput(_) | SiteError::Json(_) => StatusCode::BAD_REQUEST,
            e if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, axum::Json(ErrorReporter::format_api_error(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_categories() {
        let error = SiteError::service_unavailable("content database unreachable");
        assert_eq!(error.to_error_code(), ErrorCode::ServiceUnavailable);
        assert_eq!(error.to_error_code().as_number(), 1601);
        assert_eq!(error.to_error_code().category(), "service");
        assert!(error.is_retryable());
        assert!(!error.is_auth_error());
    }

    #[test]
    fn test_sanitized_message_hides_database_detail() {
        let error = SiteError::database("no such table: projects (libsql://secret-host)");
        assert!(!error.sanitized_message().contains("secret-host"));
    }

    #[test]
    fn test_session_expired_api_error() {
        let body = ErrorReporter::format_api_error(&SiteError::SessionExpired);
        assert_eq!(body["error"]["code"], 1102);
        assert_eq!(body["error"]["category"], "authentication");
        assert_eq!(body["error"]["retryable"], false);
    }
}
