//! Layered error definitions
//!
//! Categorized by source: config / broker / payload

use thiserror::Error;

use crate::StreamKind;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Broker Errors =====
    /// Broker unreachable or connection lost
    #[error("broker connection error ({address}): {message}")]
    Connection { address: String, message: String },

    // ===== Payload Errors =====
    /// Payload could not be decoded into a reading
    #[error("payload decode error for stream '{stream}': {message}")]
    Decode { stream: StreamKind, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create broker connection error
    pub fn connection(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Create payload decode error
    pub fn decode(stream: StreamKind, message: impl Into<String>) -> Self {
        Self::Decode {
            stream,
            message: message.into(),
        }
    }
}
