//! Abstract contract implemented by every supported messaging backend.
//!
//! External brokers (Redis, RabbitMQ, cloud pub/sub) plug in behind this same
//! trait; the embedded peer fabric in [`crate::embedded`] is the only variant
//! implemented in this repository.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Callback invoked for every delivered message as `(topic, raw JSON body)`.
pub type MessageHandler = Arc<dyn Fn(&str, &str) + Send + Sync>;

#[async_trait]
pub trait MessagingBackend: Send + Sync {
    /// Initialize backend resources and start any background work.
    async fn init(&self) -> Result<()>;

    /// Publish a message on the given topic.
    async fn publish(&self, topic: &str, message: &Value) -> Result<()>;

    /// Start queue-style listening on a topic, registering a callback.
    ///
    /// At most one handler is active per topic; a later call replaces the
    /// earlier registration.
    async fn listen(&self, topic: &str, handler: MessageHandler) -> Result<()>;

    /// Release backend resources. Stops scheduling of future background
    /// work; work already in flight is allowed to finish.
    async fn close(&self) -> Result<()>;
}
