use crate::backend::MessageHandler;
use crate::error::{PaperboyError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// Validates and dispatches messages pushed in by a serving peer.
pub struct CallbackRouter {
    token: String,
    handlers: RwLock<HashMap<String, MessageHandler>>,
}

impl CallbackRouter {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_handler(&self, topic: &str, handler: MessageHandler) {
        self.handlers
            .write()
            .expect("handlers lock poisoned")
            .insert(topic.to_string(), handler);
    }

    pub fn unregister_handler(&self, topic: &str) {
        self.handlers
            .write()
            .expect("handlers lock poisoned")
            .remove(topic);
    }

    /// Handle an inbound message push.
    ///
    /// The provided token is checked before any handler lookup. A topic with
    /// no registered handler is a silent drop: a peer may still be configured
    /// to forward a topic this node no longer listens to.
    pub fn on_inbound_message(
        &self,
        topic: &str,
        message: &Value,
        provided_token: &str,
    ) -> Result<()> {
        if provided_token != self.token {
            return Err(PaperboyError::InvalidToken);
        }

        let handler = self
            .handlers
            .read()
            .expect("handlers lock poisoned")
            .get(topic)
            .cloned();

        match handler {
            Some(handler) => {
                tracing::debug!(topic = %topic, "dispatching inbound message to handler");
                handler(topic, &message.to_string());
            }
            None => {
                tracing::debug!(topic = %topic, "no handler registered, dropping inbound message");
            }
        }

        Ok(())
    }
}
