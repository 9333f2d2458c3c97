//! MessageRouter trait - write path entry point
//!
//! Whatever owns the per-stream history implements this trait; the ingestion
//! consumer hands every drained message to it.

use crate::{BusMessage, StreamKind};

/// Why a message did not produce a stored reading
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    /// Topic is not in the stream catalog
    UnknownTopic,
    /// Payload for a known stream failed to decode
    Decode { stream: StreamKind, message: String },
}

/// Result of routing one message
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Reading appended; `evicted` is set when the oldest reading was pushed out
    Stored { stream: StreamKind, evicted: bool },
    /// Message discarded, stores unchanged
    Dropped(DropReason),
}

impl RouteOutcome {
    /// Whether a reading was stored
    pub fn is_stored(&self) -> bool {
        matches!(self, RouteOutcome::Stored { .. })
    }
}

/// Write path trait
///
/// `route` must never panic or fail: every failure is reported through the
/// returned outcome.
pub trait MessageRouter: Send + Sync {
    fn route(&self, message: &BusMessage) -> RouteOutcome;
}
