//! Reader orchestrator - wires source, ingestion pipeline and store together.
//!
//! Runs against a real broker by default, or against the synthetic
//! publisher when `mock` is set.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{MessageRouter, MessageSource, ReaderBlueprint};
use data_store::SensorDataStore;
use ingestion::{BackpressureConfig, IngestionPipeline, MockMessageSource, MqttBusClient};
use observability::RunSummary;
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::{info, warn};

use super::{render_json, render_table};
use crate::error::CliError;

/// Synthetic publisher rate in `--mock` mode
const MOCK_FREQUENCY_HZ: f64 = 10.0;

/// Reader configuration
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Validated reader blueprint
    pub blueprint: ReaderBlueprint,

    /// Use the synthetic publisher instead of a broker
    pub mock: bool,

    /// Maximum number of polls (None = unlimited)
    pub max_polls: Option<u64>,

    /// Run timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Print polls as JSON lines
    pub json: bool,
}

/// Main reader orchestrator
pub struct Reader {
    config: ReaderConfig,
}

impl Reader {
    pub fn new(config: ReaderConfig) -> Self {
        Self { config }
    }

    /// Run until the poll limit, the timeout or `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let store = Arc::new(
            SensorDataStore::from_blueprint(blueprint).context("Failed to build data store")?,
        );

        if self.config.mock {
            info!("Running in MOCK mode (no broker required)");
            let source = MockMessageSource::synthetic(&blueprint.topics.prefix, MOCK_FREQUENCY_HZ)
                .with_raw_topics(true);
            return self.run_with_source(source, store, shutdown).await;
        }

        let address = blueprint.broker.address.clone();
        info!(address = %address, "Connecting to broker...");

        let mut client = MqttBusClient::new(blueprint.broker.clone());
        client
            .connect(&address)
            .await
            .map_err(|e| CliError::broker_connection(&address, e.to_string()))?;

        let filter = blueprint.topics.subscription_filter();
        client
            .subscribe(&filter)
            .await
            .with_context(|| format!("Failed to subscribe to '{filter}'"))?;

        self.run_with_source(client, store, shutdown).await
    }

    /// Common logic shared between broker and mock modes
    async fn run_with_source<S, F>(
        &self,
        source: S,
        store: Arc<SensorDataStore>,
        shutdown: F,
    ) -> Result<RunSummary>
    where
        S: MessageSource,
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        let router: Arc<dyn MessageRouter> = store.clone();
        let mut pipeline = IngestionPipeline::new(
            source,
            router,
            BackpressureConfig::from(&blueprint.ingestion),
        );
        pipeline
            .start()
            .await
            .context("Failed to start ingestion pipeline")?;

        info!(
            subscription = %store.router().subscription(),
            poll_interval_ms = blueprint.dashboard.poll_interval_ms,
            max_polls = ?self.config.max_polls,
            "Reader running"
        );

        let polls = self.poll_loop(&store, shutdown).await;

        info!("Shutting down reader...");
        if let Err(e) = pipeline.shutdown().await {
            warn!(error = %e, "Error while stopping message source");
        }

        let ingest = pipeline.metrics().snapshot();
        let store_metrics = store.metrics();
        let summary = RunSummary {
            duration_secs: start_time.elapsed().as_secs_f64(),
            messages_received: ingest.messages_received,
            queue_dropped: ingest.queue_dropped,
            readings_stored: store_metrics.stored_total(),
            decode_errors: store_metrics.decode_errors_total(),
            unknown_topics: store_metrics.unknown_topics(),
            streams: store.stream_summaries(),
        };

        info!(
            polls,
            duration_secs = summary.duration_secs,
            rate = format!("{:.2}", summary.messages_per_sec()),
            "Reader shutdown complete"
        );

        Ok(summary)
    }

    /// Print the latest values every poll interval; returns the number of polls
    async fn poll_loop<F>(&self, store: &SensorDataStore, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        let period = Duration::from_millis(self.config.blueprint.dashboard.poll_interval_ms);
        let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let timeout = self.config.timeout;
        let deadline = async move {
            match timeout {
                Some(t) => tokio::time::sleep(t).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);
        tokio::pin!(shutdown);

        let mut polls = 0u64;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    polls += 1;
                    if self.config.json {
                        println!("{}", render_json(store, polls));
                    } else {
                        print!("{}", render_table(store, polls));
                    }

                    if let Some(max) = self.config.max_polls {
                        if polls >= max {
                            info!(polls, "Reached max polls limit");
                            break;
                        }
                    }
                }
                _ = &mut deadline => {
                    warn!(timeout_secs = timeout.map(|t| t.as_secs()), "Reader timed out");
                    break;
                }
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping reader...");
                    break;
                }
            }
        }
        polls
    }
}
