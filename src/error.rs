// src/error.rs

//! Unified error handling for the collector.

use std::fmt;

use thiserror::Error;

/// Result type alias for collector operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Object storage (S3) error
    #[error("S3 error: {0}")]
    S3(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed before a response was received
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Missing credential or malformed rule set
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration value out of range
    #[error("Validation error: {0}")]
    Validation(String),

    /// The endpoint answered with a non-retryable 4xx status
    #[error("Request rejected with HTTP {status}: {body}")]
    RequestRejected { status: u16, body: String },

    /// Retries on a transient failure were exhausted
    #[error("Endpoint still failing after {attempts} attempts (last: {message})")]
    TransientEndpoint { attempts: u32, message: String },

    /// A 2xx response whose body is not a search page
    #[error("Malformed response body: {0}")]
    MalformedResponse(String),

    /// The persisted cursor document could not be parsed
    #[error("Malformed cursor store at {location}: {message}")]
    MalformedCursorStore { location: String, message: String },

    /// Writing run output or the cursor store failed
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a persistence error.
    pub fn persistence(message: impl fmt::Display) -> Self {
        Self::Persistence(message.to_string())
    }

    /// Create a malformed cursor store error.
    pub fn malformed_cursor_store(location: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::MalformedCursorStore {
            location: location.into(),
            message: message.to_string(),
        }
    }

    /// Whether this failure only ends the current rule.
    ///
    /// Everything else aborts the whole run.
    pub fn is_rule_scoped(&self) -> bool {
        matches!(
            self,
            Self::RequestRejected { .. }
                | Self::TransientEndpoint { .. }
                | Self::MalformedResponse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_scoped_errors() {
        let rejected = AppError::RequestRejected {
            status: 400,
            body: "bad query".into(),
        };
        let exhausted = AppError::TransientEndpoint {
            attempts: 3,
            message: "HTTP 503".into(),
        };
        assert!(rejected.is_rule_scoped());
        assert!(exhausted.is_rule_scoped());
        assert!(AppError::MalformedResponse("expected value".into()).is_rule_scoped());
        assert!(!AppError::persistence("disk full").is_rule_scoped());
        assert!(!AppError::malformed_cursor_store("x.json", "eof").is_rule_scoped());
    }

    #[test]
    fn test_display_includes_status() {
        let err = AppError::RequestRejected {
            status: 401,
            body: "Unauthorized".into(),
        };
        assert_eq!(err.to_string(), "Request rejected with HTTP 401: Unauthorized");
    }
}
