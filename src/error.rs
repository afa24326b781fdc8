//! Error types and handling for Auriga
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Auriga operations
pub type Result<T> = std::result::Result<T, AurigaError>;

/// Main error type for Auriga
#[derive(Debug, Error)]
pub enum AurigaError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Network/transport errors talking to the upstream API
    #[error("Fetch error: {message}")]
    Fetch { message: String },

    /// Upstream API returned a non-success HTTP status
    #[error("HTTP error: status {status} - {message}")]
    Http { status: u16, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// A rate or consumption table with a record count outside the
    /// publication's valid range
    #[error("Incomplete data: got {count} records, expected {expected}")]
    IncompleteData { count: usize, expected: usize },

    /// Consumption/rate sequences that cannot be matched by position
    #[error("Alignment error: {actual} records against {expected} rates")]
    Alignment { expected: usize, actual: usize },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl AurigaError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        AurigaError::Config {
            message: message.into(),
        }
    }

    /// Create a new fetch error
    pub fn fetch<S: Into<String>>(message: S) -> Self {
        AurigaError::Fetch {
            message: message.into(),
        }
    }

    /// Create a new HTTP status error
    pub fn http<S: Into<String>>(status: u16, message: S) -> Self {
        AurigaError::Http {
            status,
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        AurigaError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        AurigaError::Serialization {
            message: message.into(),
        }
    }

    /// Create a new incomplete-data error
    pub fn incomplete_data(count: usize, expected: usize) -> Self {
        AurigaError::IncompleteData { count, expected }
    }

    /// Create a new alignment error
    pub fn alignment(expected: usize, actual: usize) -> Self {
        AurigaError::Alignment { expected, actual }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        AurigaError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        AurigaError::Io {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        AurigaError::Generic {
            message: message.into(),
        }
    }

    /// True for errors that are recovered by retrying on a later cycle
    /// (stale cached data is retained in the meantime)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AurigaError::Fetch { .. }
                | AurigaError::Http { .. }
                | AurigaError::Timeout { .. }
                | AurigaError::IncompleteData { .. }
                | AurigaError::Alignment { .. }
        )
    }
}

impl From<std::io::Error> for AurigaError {
    fn from(err: std::io::Error) -> Self {
        AurigaError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for AurigaError {
    fn from(err: serde_yaml::Error) -> Self {
        AurigaError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for AurigaError {
    fn from(err: serde_json::Error) -> Self {
        AurigaError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for AurigaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AurigaError::timeout(err.to_string())
        } else if err.is_decode() {
            AurigaError::serialization(err.to_string())
        } else {
            AurigaError::fetch(err.to_string())
        }
    }
}

impl From<chrono::ParseError> for AurigaError {
    fn from(err: chrono::ParseError) -> Self {
        AurigaError::validation("datetime".to_string(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = AurigaError::config("test config error");
        assert!(matches!(err, AurigaError::Config { .. }));

        let err = AurigaError::fetch("test fetch error");
        assert!(matches!(err, AurigaError::Fetch { .. }));

        let err = AurigaError::validation("field", "test validation error");
        assert!(matches!(err, AurigaError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = AurigaError::config("test error");
        let error_string = format!("{}", err);
        assert_eq!(error_string, "Configuration error: test error");

        let err = AurigaError::incomplete_data(12, 48);
        let error_string = format!("{}", err);
        assert_eq!(error_string, "Incomplete data: got 12 records, expected 48");

        let err = AurigaError::validation("test_field", "invalid value");
        let error_string = format!("{}", err);
        assert_eq!(error_string, "Validation error: test_field - invalid value");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AurigaError::fetch("x").is_retryable());
        assert!(AurigaError::incomplete_data(40, 48).is_retryable());
        assert!(AurigaError::alignment(48, 12).is_retryable());
        assert!(!AurigaError::config("x").is_retryable());
        assert!(!AurigaError::validation("f", "m").is_retryable());
    }
}
