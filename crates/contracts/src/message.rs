//! BusMessage - MessageSource output
//!
//! Raw publish/subscribe delivery and the connection lifecycle of a source.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// One message as delivered by the broker
#[derive(Debug, Clone)]
pub struct BusMessage {
    /// Concrete topic the message was published on
    pub topic: String,

    /// Raw payload bytes (zero-copy)
    pub payload: Bytes,

    /// Local wall-clock time the message was handed over
    pub received_at: SystemTime,
}

impl BusMessage {
    /// Create a message stamped with the current time
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: SystemTime::now(),
        }
    }
}

/// Connection lifecycle of a message source
///
/// `Disconnected -> Connecting -> Connected -> Reconnecting -> Connected -> ... -> Disconnected`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    /// Stable name for logs
    pub const fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        }
    }

    /// Numeric encoding for gauges
    pub const fn as_gauge(self) -> f64 {
        match self {
            ConnectionState::Disconnected => 0.0,
            ConnectionState::Connecting => 1.0,
            ConnectionState::Connected => 2.0,
            ConnectionState::Reconnecting => 3.0,
        }
    }
}

/// MQTT topic filter matching (`+` single level, `#` trailing multi level)
///
/// # Examples
/// ```
/// use contracts::topic_matches;
///
/// assert!(topic_matches("sense_hat/#", "sense_hat/data/gyro"));
/// assert!(topic_matches("sense_hat/+/gyro", "sense_hat/data/gyro"));
/// assert!(!topic_matches("sense_hat/+", "sense_hat/data/gyro"));
/// ```
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Whether `filter` is a syntactically valid MQTT subscription filter
pub fn is_valid_filter(filter: &str) -> bool {
    if filter.is_empty() {
        return false;
    }
    let levels: Vec<&str> = filter.split('/').collect();
    levels.iter().enumerate().all(|(i, level)| match *level {
        "#" => i == levels.len() - 1,
        "+" => true,
        other => !other.contains('#') && !other.contains('+'),
    })
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_matches() {
        assert!(topic_matches("sense_hat/data/#", "sense_hat/data/basic"));
        assert!(topic_matches("#", "anything/at/all"));
        assert!(topic_matches("sense_hat/data/accel", "sense_hat/data/accel"));
        assert!(!topic_matches("sense_hat/data/accel", "sense_hat/data/accel_raw"));
        assert!(!topic_matches("sense_hat/data/+", "sense_hat/data"));
        assert!(!topic_matches("other/#", "sense_hat/data/gyro"));
    }

    #[test]
    fn test_filter_validity() {
        assert!(is_valid_filter("sense_hat/#"));
        assert!(is_valid_filter("sense_hat/+/gyro"));
        assert!(!is_valid_filter("sense_hat/#/gyro"));
        assert!(!is_valid_filter("sense_hat/da#ta"));
        assert!(!is_valid_filter(""));
    }

    #[test]
    fn test_connection_state_default() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
    }
}
