//! # Ingestion Pipeline
//!
//! Telemetry ingestion module.
//!
//! Responsibilities:
//! - Maintain the broker connection (`MqttBusClient`), with reconnect and backoff
//! - Provide a broker-free source for tests and demos (`MockMessageSource`)
//! - Backpressure management and drop policy on the internal queue
//! - Drain the queue with a single consumer into a `MessageRouter`
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{BackpressureConfig, IngestionPipeline, MqttBusClient};
//!
//! let mut client = MqttBusClient::new(blueprint.broker.clone());
//! client.connect("pi-fw.local:1883").await?;
//! client.subscribe("sense_hat/#").await?;
//!
//! let mut pipeline = IngestionPipeline::new(client, store.clone(), BackpressureConfig::default());
//! pipeline.start().await?;
//! // ... poll the store ...
//! pipeline.shutdown().await?;
//! ```
//!
//! ## Mock Testing
//!
//! ```ignore
//! use ingestion::MockMessageSource;
//!
//! let source = MockMessageSource::synthetic("sense_hat/data", 10.0).with_raw_topics(true);
//! ```

mod bus;
mod config;
mod error;
mod mock;
mod pipeline;
mod retry;

// Re-exports
pub use bus::MqttBusClient;
pub use config::{BackpressureConfig, DropPolicy, IngestionMetrics, MetricsSnapshot};
pub use error::{IngestionError, Result};
pub use mock::{synthetic_payload, MockMessageSource, MockSourceConfig, RAW_TOPIC_SUFFIXES};
pub use pipeline::IngestionPipeline;
pub use retry::RetryPolicy;
