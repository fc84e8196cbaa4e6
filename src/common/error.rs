//! Error types for the synthetics CLI
//!
//! Startup errors (coercion, config files) are fatal and abort the run
//! before any remote call. Remote errors are wrapped in [`ApiError`] and are
//! normally tallied by the runner instead of being propagated.

use std::io;
use thiserror::Error;

use crate::api::ApiError;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the synthetics CLI
#[derive(Error, Debug)]
pub enum Error {
    // === Coercion Errors ===
    #[error("Invalid value '{value}' for {field}: {reason}")]
    Parse {
        field: String,
        value: String,
        reason: String,
    },

    // === Configuration Errors ===
    #[error("Config file not found at '{path}'. Check the --config flag or DATADOG_SYNTHETICS_CONFIG_PATH")]
    ConfigFileNotFound { path: String },

    #[error("Config file '{path}' is not valid JSON: {error}")]
    ConfigFileParse { path: String, error: String },

    #[error("Configuration error: {0}")]
    Config(String),

    // === Remote Errors ===
    #[error(transparent)]
    Api(#[from] ApiError),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a parse error for a named field
    pub fn parse(field: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a config file parse error
    pub fn config_file_parse(path: &str, error: impl ToString) -> Self {
        Self::ConfigFileParse {
            path: path.to_string(),
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_names_field_and_value() {
        let err = Error::parse("retry.count", "abc", "expected a number");
        let msg = err.to_string();
        assert!(msg.contains("retry.count"));
        assert!(msg.contains("abc"));
    }

    #[test]
    fn test_config_file_not_found_has_hint() {
        let err = Error::ConfigFileNotFound {
            path: "missing.json".to_string(),
        };
        assert!(err.to_string().contains("--config"));
    }
}
