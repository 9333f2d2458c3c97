//! Decode error types

use thiserror::Error;

/// Why a payload could not become a reading
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// Bytes are not valid JSON
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// JSON value is not an object
    #[error("payload is not a JSON object")]
    NotAnObject,

    /// `ts` field absent
    #[error("missing timestamp field 'ts'")]
    MissingTimestamp,

    /// `ts` not numeric or not representable as a date
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Required field absent
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    /// Field present but not numeric
    #[error("field '{field}' is not numeric: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Decode Result 类型别名
pub type Result<T> = std::result::Result<T, DecodeError>;
