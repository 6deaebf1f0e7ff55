use super::membership::PeerAddress;
use crate::error::{PaperboyError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Shared bearer token header carried on every inter-node call.
pub const TOKEN_HEADER: &str = "PaperboyEmbeddedBackendToken";

/// Address this node exposes for inbound message pushes on one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackDescriptor {
    pub rest_hostname: String,
    pub rest_port: u16,
    pub rest_path: String,
}

impl CallbackDescriptor {
    pub fn url(&self) -> String {
        format!(
            "http://{}:{}{}",
            self.rest_hostname, self.rest_port, self.rest_path
        )
    }
}

/// Outbound point-to-point calls of the fabric protocol.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// `POST /pushMessage/{topic}` — one leg of a broadcast publish.
    async fn push_message(&self, peer: &PeerAddress, topic: &str, message: &Value) -> Result<()>;

    /// `POST /subscribeTopic/{topic}` — register the callback as the topic's
    /// sole subscriber at `peer`. Last writer wins on the peer side.
    async fn subscribe_topic(
        &self,
        peer: &PeerAddress,
        topic: &str,
        callback: &CallbackDescriptor,
    ) -> Result<()>;

    /// `GET /instance` — the peer's current process-lifetime identifier.
    async fn instance_id(&self, peer: &PeerAddress) -> Result<String>;

    /// `POST {restPath}` — push a message to a subscriber's callback address.
    async fn deliver(&self, callback: &CallbackDescriptor, message: &Value) -> Result<()>;
}

/// reqwest-backed [`PeerClient`].
///
/// Every call carries the shared token and is bounded by a client-level
/// timeout; timeouts and connect errors surface as `PeerUnreachable`.
pub struct HttpPeerClient {
    client: Client,
    token: String,
}

impl HttpPeerClient {
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| PaperboyError::Http(format!("failed to build HTTP client: {}", error)))?;

        Ok(Self {
            client,
            token: token.into(),
        })
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<()> {
        let response = self
            .client
            .post(url)
            .header(TOKEN_HEADER, &self.token)
            .json(body)
            .send()
            .await
            .map_err(|error| PaperboyError::PeerUnreachable(error.to_string()))?;

        if !response.status().is_success() {
            return Err(PaperboyError::PeerUnreachable(format!(
                "call to {} returned status {}",
                url,
                response.status()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn push_message(&self, peer: &PeerAddress, topic: &str, message: &Value) -> Result<()> {
        let url = format!("{}/pushMessage/{}", peer.base_url(), topic);
        self.post_json(&url, message).await
    }

    async fn subscribe_topic(
        &self,
        peer: &PeerAddress,
        topic: &str,
        callback: &CallbackDescriptor,
    ) -> Result<()> {
        let url = format!("{}/subscribeTopic/{}", peer.base_url(), topic);
        self.post_json(&url, &serde_json::to_value(callback)?).await
    }

    async fn instance_id(&self, peer: &PeerAddress) -> Result<String> {
        let url = format!("{}/instance", peer.base_url());
        let response = self
            .client
            .get(&url)
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|error| PaperboyError::PeerUnreachable(error.to_string()))?;

        if !response.status().is_success() {
            return Err(PaperboyError::PeerUnreachable(format!(
                "instance probe of {} returned status {}",
                peer,
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|error| PaperboyError::PeerUnreachable(error.to_string()))
    }

    async fn deliver(&self, callback: &CallbackDescriptor, message: &Value) -> Result<()> {
        self.post_json(&callback.url(), message).await
    }
}
