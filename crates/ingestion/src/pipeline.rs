//! Ingestion Pipeline main entry
//!
//! ```text
//! MessageSource ──callback──► bounded queue ──► consumer task ──► MessageRouter
//!  (network context)          (drop policy)     (single, serial)
//! ```

use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender, TrySendError};
use contracts::{BusMessage, MessageCallback, MessageRouter, MessageSource};
use metrics::gauge;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::{BackpressureConfig, DropPolicy, IngestionMetrics};
use crate::error::{IngestionError, Result};

/// Ingestion Pipeline
///
/// Owns one message source and feeds everything it delivers through a bounded
/// queue into a single consumer that calls the router.
pub struct IngestionPipeline<S> {
    source: S,
    router: Arc<dyn MessageRouter>,
    config: BackpressureConfig,
    metrics: Arc<IngestionMetrics>,
    tx: Option<Sender<BusMessage>>,
    consumer: Option<JoinHandle<()>>,
}

impl<S: MessageSource> IngestionPipeline<S> {
    /// Create new Ingestion Pipeline
    pub fn new(source: S, router: Arc<dyn MessageRouter>, config: BackpressureConfig) -> Self {
        Self {
            source,
            router,
            config,
            metrics: Arc::new(IngestionMetrics::new()),
            tx: None,
            consumer: None,
        }
    }

    /// Start the consumer, then the source
    #[instrument(name = "ingestion_start", skip(self))]
    pub async fn start(&mut self) -> Result<()> {
        if self.consumer.is_some() {
            return Err(IngestionError::AlreadyRunning);
        }

        let (tx, rx) = bounded(self.config.channel_capacity);
        self.consumer = Some(tokio::spawn(consume(
            rx.clone(),
            self.router.clone(),
            self.metrics.clone(),
        )));

        let callback = enqueue_callback(
            tx.clone(),
            rx,
            self.metrics.clone(),
            self.config.drop_policy,
        );
        self.tx = Some(tx);

        if let Err(e) = self.source.listen(callback).await {
            warn!(source = %self.source.name(), error = %e, "Source failed to start");
            self.drain().await;
            return Err(e.into());
        }

        info!(
            source = %self.source.name(),
            capacity = self.config.channel_capacity,
            drop_policy = ?self.config.drop_policy,
            "Ingestion started"
        );
        Ok(())
    }

    /// Stop the source, then let the consumer finish every queued message
    #[instrument(name = "ingestion_shutdown", skip(self))]
    pub async fn shutdown(&mut self) -> Result<()> {
        let stopped = self.source.stop().await;
        self.drain().await;

        let snapshot = self.metrics.snapshot();
        info!(
            received = snapshot.messages_received,
            dropped = snapshot.queue_dropped,
            routed = snapshot.routed,
            "Ingestion stopped"
        );
        stopped.map_err(IngestionError::from)
    }

    async fn drain(&mut self) {
        if let Some(tx) = self.tx.take() {
            tx.close();
        }
        if let Some(consumer) = self.consumer.take() {
            if let Err(e) = consumer.await {
                warn!(error = %e, "Consumer task failed");
            }
        }
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn is_running(&self) -> bool {
        self.consumer.is_some()
    }
}

fn enqueue_callback(
    tx: Sender<BusMessage>,
    rx: Receiver<BusMessage>,
    metrics: Arc<IngestionMetrics>,
    drop_policy: DropPolicy,
) -> MessageCallback {
    Arc::new(move |message| {
        metrics.record_received();
        observability::record_message_received();
        enqueue(&tx, &rx, message, &metrics, drop_policy);
    })
}

/// Send message, handling backpressure policy
#[inline]
pub(crate) fn enqueue(
    tx: &Sender<BusMessage>,
    rx: &Receiver<BusMessage>,
    message: BusMessage,
    metrics: &IngestionMetrics,
    drop_policy: DropPolicy,
) {
    match tx.try_send(message) {
        Ok(()) => {
            metrics.update_queue_len(tx.len());
        }
        Err(TrySendError::Full(message)) => {
            metrics.record_dropped();
            observability::record_queue_dropped();
            match drop_policy {
                DropPolicy::DropNewest => {
                    trace!(topic = %message.topic, "Queue full, dropped newest");
                }
                DropPolicy::DropOldest => {
                    if let Ok(evicted) = rx.try_recv() {
                        trace!(topic = %evicted.topic, "Queue full, dropped oldest");
                    }
                    if let Err(e) = tx.try_send(message) {
                        trace!(topic = %e.into_inner().topic, "Queue still full, dropped newest");
                    }
                }
            }
        }
        Err(TrySendError::Closed(message)) => {
            debug!(topic = %message.topic, "Queue closed, message discarded");
        }
    }
}

async fn consume(
    rx: Receiver<BusMessage>,
    router: Arc<dyn MessageRouter>,
    metrics: Arc<IngestionMetrics>,
) {
    while let Ok(message) = rx.recv().await {
        let depth = rx.len();
        metrics.update_queue_len(depth);
        gauge!("sense_reader_queue_depth").set(depth as f64);

        let outcome = router.route(&message);
        metrics.record_outcome(&outcome);
    }

    metrics.update_queue_len(0);
    debug!("Consumer drained");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockMessageSource;
    use contracts::{DropReason, RouteOutcome, StreamKind};
    use std::sync::Mutex;

    /// Records every topic it sees, stores everything
    #[derive(Default)]
    struct RecordingRouter {
        topics: Mutex<Vec<String>>,
    }

    impl MessageRouter for RecordingRouter {
        fn route(&self, message: &BusMessage) -> RouteOutcome {
            self.topics.lock().unwrap().push(message.topic.clone());
            if message.topic.starts_with("unknown") {
                RouteOutcome::Dropped(DropReason::UnknownTopic)
            } else {
                RouteOutcome::Stored {
                    stream: StreamKind::Basic,
                    evicted: false,
                }
            }
        }
    }

    fn script(topics: &[&str]) -> Vec<BusMessage> {
        topics.iter().map(|t| BusMessage::new(*t, "{}")).collect()
    }

    #[tokio::test]
    async fn test_pipeline_delivers_in_order() {
        let router = Arc::new(RecordingRouter::default());
        let source = MockMessageSource::scripted(script(&["t/1", "unknown/2", "t/3"]));
        let mut pipeline =
            IngestionPipeline::new(source, router.clone(), BackpressureConfig::default());

        pipeline.start().await.unwrap();
        pipeline.shutdown().await.unwrap();

        assert_eq!(*router.topics.lock().unwrap(), vec!["t/1", "unknown/2", "t/3"]);
        let snapshot = pipeline.metrics().snapshot();
        assert_eq!(snapshot.messages_received, 3);
        assert_eq!(snapshot.routed, 2);
        assert_eq!(snapshot.unknown_topics, 1);
        assert_eq!(snapshot.queue_len, 0);
    }

    // Scripted sources deliver inside `listen` without yielding, so on the
    // current-thread test runtime the consumer only runs after all sends.
    #[tokio::test]
    async fn test_drop_newest_when_full() {
        let router = Arc::new(RecordingRouter::default());
        let source = MockMessageSource::scripted(script(&["t/1", "t/2", "t/3", "t/4", "t/5"]));
        let mut pipeline = IngestionPipeline::new(
            source,
            router.clone(),
            BackpressureConfig::new(2, DropPolicy::DropNewest),
        );

        pipeline.start().await.unwrap();
        pipeline.shutdown().await.unwrap();

        assert_eq!(*router.topics.lock().unwrap(), vec!["t/1", "t/2"]);
        assert_eq!(pipeline.metrics().snapshot().queue_dropped, 3);
    }

    #[tokio::test]
    async fn test_drop_oldest_when_full() {
        let router = Arc::new(RecordingRouter::default());
        let source = MockMessageSource::scripted(script(&["t/1", "t/2", "t/3", "t/4", "t/5"]));
        let mut pipeline = IngestionPipeline::new(
            source,
            router.clone(),
            BackpressureConfig::new(2, DropPolicy::DropOldest),
        );

        pipeline.start().await.unwrap();
        pipeline.shutdown().await.unwrap();

        assert_eq!(*router.topics.lock().unwrap(), vec!["t/4", "t/5"]);
        assert_eq!(pipeline.metrics().snapshot().queue_dropped, 3);
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let router = Arc::new(RecordingRouter::default());
        let mut pipeline = IngestionPipeline::new(
            MockMessageSource::synthetic("sense_hat/data", 10.0),
            router,
            BackpressureConfig::default(),
        );

        pipeline.start().await.unwrap();
        assert!(pipeline.is_running());
        assert!(matches!(
            pipeline.start().await,
            Err(IngestionError::AlreadyRunning)
        ));

        pipeline.shutdown().await.unwrap();
        assert!(!pipeline.is_running());
    }

    #[tokio::test]
    async fn test_with_sensor_store() {
        let store = Arc::new(data_store::SensorDataStore::from_blueprint(&Default::default()).unwrap());
        let source = MockMessageSource::scripted(vec![
            BusMessage::new(
                "sense_hat/data/orientation",
                r#"{"ts": 1700000000.0, "roll": 1.23456, "pitch": 2.0, "yaw": 3.0}"#,
            ),
            BusMessage::new("sense_hat/data/orientation", "not json"),
        ]);
        let mut pipeline = IngestionPipeline::new(source, store.clone(), BackpressureConfig::default());

        pipeline.start().await.unwrap();
        pipeline.shutdown().await.unwrap();

        let latest = store.latest("orientation").unwrap();
        assert_eq!(latest.get("roll"), Some(1.235));
        assert_eq!(pipeline.metrics().snapshot().decode_errors, 1);
    }
}
