//! MessageSource trait - Message bus abstraction
//!
//! Defines a unified interface for telemetry delivery, decoupling the ingestion
//! pipeline from the concrete transport (MQTT broker or in-process mock).

use std::sync::Arc;

use crate::{BusMessage, ContractError};

/// Message delivery callback type
///
/// A source invokes the callback once per inbound message, never concurrently
/// for the same source.
pub type MessageCallback = Arc<dyn Fn(BusMessage) + Send + Sync>;

/// Message source trait
///
/// Abstracts the common behavior of the broker client and mock publishers.
///
/// # Example
///
/// ```ignore
/// let mut source = MockMessageSource::synthetic("sense_hat/data", 10.0);
/// source.listen(Arc::new(|msg| {
///     println!("Received {} bytes on {}", msg.payload.len(), msg.topic);
/// })).await?;
/// // ... use source ...
/// source.stop().await?;
/// ```
#[trait_variant::make(MessageSource: Send)]
pub trait LocalMessageSource {
    /// Source name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Start delivering messages to `callback`
    ///
    /// Calling `listen` on a source that is already listening is an error.
    async fn listen(&mut self, callback: MessageCallback) -> Result<(), ContractError>;

    /// Stop delivery
    ///
    /// When this returns, the callback is no longer invoked and any invocation
    /// that was in progress has completed.
    async fn stop(&mut self) -> Result<(), ContractError>;

    /// Check if currently delivering
    fn is_listening(&self) -> bool;
}
