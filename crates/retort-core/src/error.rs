//! Error types for retort operations.

use thiserror::Error;

/// Result type alias for retort operations.
pub type RetortResult<T> = Result<T, RetortError>;

/// Main error type for all retort operations.
#[derive(Error, Debug)]
pub enum RetortError {
    /// User-supplied input was rejected (duplicate pattern, missing rule, ...).
    ///
    /// These are surfaced to the end user as short status strings, never as
    /// process-level failures.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A rule or response the caller referred to does not exist.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// A template directive or expression could not be parsed.
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RetortError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error stems from bad user input rather than a fault in
    /// the engine or its storage.
    pub fn is_user_fault(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::NotFound { .. })
    }

    /// The bare status text shown to the end user for input faults.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            Self::Validation { message } | Self::NotFound { message } => Some(message),
            _ => None,
        }
    }
}
