//! Backpressure configuration and metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::{DropReason, IngestionConfig, RouteOutcome};

pub use contracts::DropPolicy;

/// Backpressure configuration
#[derive(Debug, Clone)]
pub struct BackpressureConfig {
    /// Queue capacity between the network context and the consumer
    pub channel_capacity: usize,

    /// Drop policy when full
    pub drop_policy: DropPolicy,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self::from(&IngestionConfig::default())
    }
}

impl BackpressureConfig {
    /// Create new backpressure configuration
    pub fn new(channel_capacity: usize, drop_policy: DropPolicy) -> Self {
        Self {
            channel_capacity: channel_capacity.max(1),
            drop_policy,
        }
    }
}

impl From<&IngestionConfig> for BackpressureConfig {
    fn from(config: &IngestionConfig) -> Self {
        Self::new(config.queue_capacity, config.drop_policy)
    }
}

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Messages handed over by the source
    pub messages_received: AtomicU64,

    /// Messages dropped because the queue was full
    pub queue_dropped: AtomicU64,

    /// Current queue length
    pub queue_len: AtomicUsize,

    /// Messages that produced a stored reading
    pub routed: AtomicU64,

    /// Messages discarded by the router (unknown topic)
    pub unknown_topics: AtomicU64,

    /// Messages discarded by the router (decode failure)
    pub decode_errors: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record message received
    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record message dropped at the queue
    pub fn record_dropped(&self) {
        self.queue_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the router's verdict
    pub fn record_outcome(&self, outcome: &RouteOutcome) {
        let counter = match outcome {
            RouteOutcome::Stored { .. } => &self.routed,
            RouteOutcome::Dropped(DropReason::UnknownTopic) => &self.unknown_topics,
            RouteOutcome::Dropped(DropReason::Decode { .. }) => &self.decode_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Update queue length
    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            queue_dropped: self.queue_dropped.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
            routed: self.routed.load(Ordering::Relaxed),
            unknown_topics: self.unknown_topics.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub queue_dropped: u64,
    pub queue_len: usize,
    pub routed: u64,
    pub unknown_topics: u64,
    pub decode_errors: u64,
}

impl MetricsSnapshot {
    /// Messages the consumer has finished with
    pub fn processed(&self) -> u64 {
        self.routed + self.unknown_topics + self.decode_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::StreamKind;

    #[test]
    fn test_backpressure_from_config() {
        let config = BackpressureConfig::from(&IngestionConfig {
            queue_capacity: 0,
            drop_policy: DropPolicy::DropOldest,
        });
        assert_eq!(config.channel_capacity, 1);
        assert_eq!(config.drop_policy, DropPolicy::DropOldest);
    }

    #[test]
    fn test_record_outcome() {
        let metrics = IngestionMetrics::new();
        metrics.record_outcome(&RouteOutcome::Stored {
            stream: StreamKind::Basic,
            evicted: false,
        });
        metrics.record_outcome(&RouteOutcome::Dropped(DropReason::UnknownTopic));
        metrics.record_outcome(&RouteOutcome::Dropped(DropReason::Decode {
            stream: StreamKind::Gyro,
            message: "missing field 'yaw'".to_string(),
        }));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.routed, 1);
        assert_eq!(snapshot.unknown_topics, 1);
        assert_eq!(snapshot.decode_errors, 1);
        assert_eq!(snapshot.processed(), 3);
    }
}
