//! Configuration error types.

use thiserror::Error;

/// Configuration-related errors.
///
/// Every variant is fatal at start-up: the sidecar refuses to serve with a
/// partially-resolved configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is absent.
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    /// A variable is present but cannot be coerced to the expected type.
    #[error("invalid value for {var}: {message}")]
    InvalidValue {
        /// Name of the offending variable.
        var: String,
        /// What went wrong.
        message: String,
    },
}

impl ConfigError {
    /// Build an `InvalidValue` error.
    pub fn invalid(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            var: var.into(),
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
