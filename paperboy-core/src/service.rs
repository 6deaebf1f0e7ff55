//! Application-facing messaging service on top of a backend.
//!
//! Token issuance and verification live behind the [`SubscriptionAuthorizer`]
//! trait; this layer only moves envelopes between the well-known topics.

use crate::backend::{MessageHandler, MessagingBackend};
use crate::error::Result;
use crate::message::{AuthorizationMessage, Message};
use serde_json::Value;
use std::sync::Arc;

pub const MESSAGE_TOPIC: &str = "paperboy-message";
pub const SUBSCRIPTION_REQUEST_TOPIC: &str = "paperboy-subscription-request";
pub const SUBSCRIPTION_AUTHORIZED_TOPIC: &str = "paperboy-subscription-authorized";
pub const SUBSCRIPTION_CLOSE_TOPIC: &str = "paperboy-subscription-close";

/// External collaborator deciding whether a subscription request is allowed.
///
/// Implementations typically verify a signed token and return the authorized
/// user/channel pair for the requesting websocket.
pub trait SubscriptionAuthorizer: Send + Sync {
    fn authorize(&self, token: &str, ws_id: &str) -> Result<AuthorizationMessage>;
}

/// Application hook fired after a subscription request is authorized and the
/// authorization has been republished, so the host can push initial state to
/// the new subscriber.
pub trait SubscriptionObserver: Send + Sync {
    fn on_subscription(&self, user_id: &str, channel: &str);
}

pub struct MessagingService {
    backend: Arc<dyn MessagingBackend>,
    authorizer: Arc<dyn SubscriptionAuthorizer>,
    observer: Option<Arc<dyn SubscriptionObserver>>,
}

impl MessagingService {
    pub fn new(
        backend: Arc<dyn MessagingBackend>,
        authorizer: Arc<dyn SubscriptionAuthorizer>,
    ) -> Self {
        Self {
            backend,
            authorizer,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SubscriptionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Initialize the backend and start the subscription request listener.
    pub async fn init(&self) -> Result<()> {
        self.backend.init().await?;

        let backend = Arc::clone(&self.backend);
        let authorizer = Arc::clone(&self.authorizer);
        let observer = self.observer.clone();
        let handler: MessageHandler = Arc::new(move |_topic, raw| {
            let backend = Arc::clone(&backend);
            let authorizer = Arc::clone(&authorizer);
            let observer = observer.clone();
            let raw = raw.to_string();
            tokio::spawn(async move {
                if let Err(error) =
                    handle_subscription_request(backend, authorizer, observer, &raw).await
                {
                    tracing::error!(error = %error, "subscription request handling failed");
                }
            });
        });

        self.backend
            .listen(SUBSCRIPTION_REQUEST_TOPIC, handler)
            .await?;
        tracing::info!("paperboy subscription request listener started");
        Ok(())
    }

    pub async fn send_to_user(&self, user_id: &str, payload: Value) -> Result<()> {
        let message = Message::to_user(user_id, payload);
        self.backend
            .publish(MESSAGE_TOPIC, &serde_json::to_value(&message)?)
            .await
    }

    pub async fn send_to_channel(&self, channel: &str, payload: Value) -> Result<()> {
        let message = Message::to_channel(channel, payload);
        self.backend
            .publish(MESSAGE_TOPIC, &serde_json::to_value(&message)?)
            .await
    }

    pub async fn close_subscription(&self, user_id: &str, channel: &str) -> Result<()> {
        let message = AuthorizationMessage::subscription_close(user_id, channel);
        self.backend
            .publish(SUBSCRIPTION_CLOSE_TOPIC, &serde_json::to_value(&message)?)
            .await
    }

    pub async fn close(&self) -> Result<()> {
        self.backend.close().await
    }
}

async fn handle_subscription_request(
    backend: Arc<dyn MessagingBackend>,
    authorizer: Arc<dyn SubscriptionAuthorizer>,
    observer: Option<Arc<dyn SubscriptionObserver>>,
    raw: &str,
) -> Result<()> {
    let request: AuthorizationMessage = serde_json::from_str(raw)?;
    let token = request.token.unwrap_or_default();
    let ws_id = request.ws_id.unwrap_or_default();

    let authorized = authorizer.authorize(&token, &ws_id)?;
    tracing::info!(ws_id = %ws_id, "subscription authorized");

    backend
        .publish(
            SUBSCRIPTION_AUTHORIZED_TOPIC,
            &serde_json::to_value(&authorized)?,
        )
        .await?;

    if let Some(observer) = observer {
        observer.on_subscription(
            authorized.user_id.as_deref().unwrap_or_default(),
            authorized.channel.as_deref().unwrap_or_default(),
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PaperboyError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBackend {
        published: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl MessagingBackend for RecordingBackend {
        async fn init(&self) -> Result<()> {
            Ok(())
        }

        async fn publish(&self, topic: &str, message: &Value) -> Result<()> {
            self.published
                .lock()
                .expect("published lock")
                .push((topic.to_string(), message.clone()));
            Ok(())
        }

        async fn listen(&self, _topic: &str, _handler: MessageHandler) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    struct DenyAll;

    impl SubscriptionAuthorizer for DenyAll {
        fn authorize(&self, _token: &str, _ws_id: &str) -> Result<AuthorizationMessage> {
            Err(PaperboyError::InvalidToken)
        }
    }

    struct AllowAll;

    impl SubscriptionAuthorizer for AllowAll {
        fn authorize(&self, _token: &str, ws_id: &str) -> Result<AuthorizationMessage> {
            Ok(AuthorizationMessage {
                ws_id: Some(ws_id.to_string()),
                token: None,
                user_id: Some("u-1".to_string()),
                channel: Some("news".to_string()),
            })
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        seen: Mutex<Vec<(String, String)>>,
    }

    impl SubscriptionObserver for RecordingObserver {
        fn on_subscription(&self, user_id: &str, channel: &str) {
            self.seen
                .lock()
                .expect("seen lock")
                .push((user_id.to_string(), channel.to_string()));
        }
    }

    #[tokio::test]
    async fn send_to_user_publishes_message_envelope() {
        let backend = Arc::new(RecordingBackend::default());
        let service = MessagingService::new(backend.clone(), Arc::new(DenyAll));

        service
            .send_to_user("u-1", serde_json::json!({"body": "hello"}))
            .await
            .expect("send");

        let published = backend.published.lock().expect("published lock");
        assert_eq!(published.len(), 1);
        let (topic, envelope) = &published[0];
        assert_eq!(topic, MESSAGE_TOPIC);
        assert_eq!(envelope["userId"], "u-1");
        assert!(envelope["channel"].is_null());
    }

    #[tokio::test]
    async fn authorized_subscription_republishes_and_notifies_the_observer() {
        let backend = Arc::new(RecordingBackend::default());
        let observer = Arc::new(RecordingObserver::default());

        handle_subscription_request(
            backend.clone(),
            Arc::new(AllowAll),
            Some(observer.clone()),
            r#"{"wsId":"ws-7","token":"t"}"#,
        )
        .await
        .expect("handle");

        let published = backend.published.lock().expect("published lock");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, SUBSCRIPTION_AUTHORIZED_TOPIC);

        let seen = observer.seen.lock().expect("seen lock");
        assert_eq!(seen.as_slice(), &[("u-1".to_string(), "news".to_string())]);
    }

    #[tokio::test]
    async fn denied_subscription_skips_republish_and_observer() {
        let backend = Arc::new(RecordingBackend::default());
        let observer = Arc::new(RecordingObserver::default());

        let result = handle_subscription_request(
            backend.clone(),
            Arc::new(DenyAll),
            Some(observer.clone()),
            r#"{"wsId":"ws-7","token":"t"}"#,
        )
        .await;

        assert!(matches!(result, Err(PaperboyError::InvalidToken)));
        assert!(backend.published.lock().expect("published lock").is_empty());
        assert!(observer.seen.lock().expect("seen lock").is_empty());
    }

    #[tokio::test]
    async fn close_subscription_publishes_on_close_topic() {
        let backend = Arc::new(RecordingBackend::default());
        let service = MessagingService::new(backend.clone(), Arc::new(DenyAll));

        service
            .close_subscription("u-1", "news")
            .await
            .expect("close subscription");

        let published = backend.published.lock().expect("published lock");
        let (topic, envelope) = &published[0];
        assert_eq!(topic, SUBSCRIPTION_CLOSE_TOPIC);
        assert_eq!(envelope["userId"], "u-1");
        assert_eq!(envelope["channel"], "news");
    }
}
