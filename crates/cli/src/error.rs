//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration validation error (after CLI overrides)
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    /// Broker connection error
    #[error("Failed to reach broker at {address}: {message}")]
    BrokerConnection { address: String, message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    pub fn broker_connection(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BrokerConnection {
            address: address.into(),
            message: message.into(),
        }
    }
}
