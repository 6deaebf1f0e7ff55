use super::balancer::RoundRobin;
use super::callback::CallbackRouter;
use super::discovery::{MdnsDiscovery, PeerDiscovery};
use super::membership::MembershipStore;
use super::subscription::{SubscriptionView, Subscriptions};
use super::transport::{CallbackDescriptor, HttpPeerClient, PeerClient};
use crate::backend::{MessageHandler, MessagingBackend};
use crate::error::{PaperboyError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedConfig {
    /// Shared bearer secret for the whole fabric.
    pub token: String,
    /// Host peers should push callback messages to.
    pub callback_host: String,
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,
    #[serde(default = "default_discovery_window_secs")]
    pub discovery_window_secs: u64,
    #[serde(default = "default_discovery_interval_secs")]
    pub discovery_interval_secs: u64,
    #[serde(default = "default_failover_interval_secs")]
    pub failover_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_callback_port() -> u16 {
    8080
}

fn default_discovery_window_secs() -> u64 {
    6
}

fn default_discovery_interval_secs() -> u64 {
    10
}

fn default_failover_interval_secs() -> u64 {
    2
}

fn default_request_timeout_secs() -> u64 {
    5
}

/// Embedded peer-fabric backend.
///
/// Publishes fan out to every discovered peer; queue-style listening pins a
/// topic to one serving peer and the failover loop keeps that registration
/// alive across peer restarts and failures.
pub struct EmbeddedBackend {
    config: EmbeddedConfig,
    membership: Arc<MembershipStore>,
    balancer: Arc<RoundRobin>,
    client: Arc<dyn PeerClient>,
    discovery: Arc<dyn PeerDiscovery>,
    subscriptions: Arc<Subscriptions>,
    router: Arc<CallbackRouter>,
    shutdown: watch::Sender<bool>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl EmbeddedBackend {
    pub fn new(config: EmbeddedConfig) -> Result<Self> {
        let client = Arc::new(HttpPeerClient::new(
            config.token.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?);
        let discovery = Arc::new(MdnsDiscovery::new(Duration::from_secs(
            config.discovery_window_secs,
        )));
        Ok(Self::with_parts(config, client, discovery))
    }

    /// Assemble a backend from explicit transport and discovery parts.
    pub fn with_parts(
        config: EmbeddedConfig,
        client: Arc<dyn PeerClient>,
        discovery: Arc<dyn PeerDiscovery>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            router: Arc::new(CallbackRouter::new(config.token.clone())),
            config,
            membership: Arc::new(MembershipStore::new()),
            balancer: Arc::new(RoundRobin::new()),
            client,
            discovery,
            subscriptions: Arc::new(Subscriptions::new()),
            shutdown,
            tasks: StdMutex::new(Vec::new()),
        }
    }

    /// Router the host's HTTP layer should hand inbound callback pushes to.
    pub fn router(&self) -> Arc<CallbackRouter> {
        Arc::clone(&self.router)
    }

    /// Entry point for `POST /messageCallback/{topic}` in the host's server.
    pub fn on_message_callback(
        &self,
        topic: &str,
        message: &Value,
        provided_token: &str,
    ) -> Result<()> {
        self.router.on_inbound_message(topic, message, provided_token)
    }

    /// Current state of the subscription for a topic, if one is active.
    pub async fn subscription(&self, topic: &str) -> Option<SubscriptionView> {
        self.subscriptions.view(topic).await
    }

    fn spawn_discovery_loop(&self) -> JoinHandle<()> {
        let membership = Arc::clone(&self.membership);
        let discovery = Arc::clone(&self.discovery);
        let mut shutdown = self.shutdown.subscribe();
        let period = Duration::from_secs(self.config.discovery_interval_secs);

        tokio::spawn(async move {
            let mut ticker = interval(period);
            // The initial synchronous discovery already ran; skip the
            // interval's immediate first tick.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => break,
                }

                discovery_tick(&membership, discovery.as_ref()).await;
            }
        })
    }

    fn spawn_failover_loop(&self) -> JoinHandle<()> {
        let membership = Arc::clone(&self.membership);
        let balancer = Arc::clone(&self.balancer);
        let client = Arc::clone(&self.client);
        let subscriptions = Arc::clone(&self.subscriptions);
        let mut shutdown = self.shutdown.subscribe();
        let period = Duration::from_secs(self.config.failover_interval_secs);

        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => break,
                }

                subscriptions
                    .failover_tick(&membership, &balancer, client.as_ref())
                    .await;
            }
        })
    }
}

/// One discovery cycle: replace the snapshot on success, keep the previous
/// membership when the cycle finds nothing or fails.
async fn discovery_tick(membership: &MembershipStore, discovery: &dyn PeerDiscovery) {
    match discovery.discover().await {
        Ok(peers) if peers.is_empty() => {
            tracing::warn!("discovery cycle found no peers, keeping previous membership");
        }
        Ok(peers) => {
            tracing::debug!(peers = peers.len(), "membership snapshot replaced");
            membership.replace(peers);
        }
        Err(error) => tracing::warn!(error = %error, "discovery cycle failed"),
    }
}

#[async_trait]
impl MessagingBackend for EmbeddedBackend {
    async fn init(&self) -> Result<()> {
        tracing::info!("initializing embedded backend");

        let peers = self.discovery.discover().await?;
        if peers.is_empty() {
            return Err(PaperboyError::Discovery(
                "no fabric peers answered the initial discovery query".to_string(),
            ));
        }
        tracing::info!(peers = peers.len(), "initial fabric membership established");
        self.membership.replace(peers);

        let mut tasks = self.tasks.lock().expect("tasks lock poisoned");
        tasks.push(self.spawn_discovery_loop());
        tasks.push(self.spawn_failover_loop());
        Ok(())
    }

    async fn publish(&self, topic: &str, message: &Value) -> Result<()> {
        let snapshot = self.membership.snapshot();
        if snapshot.is_empty() {
            tracing::debug!(topic = %topic, "no peers in snapshot, publish is a no-op");
            return Ok(());
        }

        tracing::debug!(topic = %topic, peers = snapshot.len(), "publishing message");
        for peer in snapshot.iter() {
            if let Err(error) = self.client.push_message(peer, topic, message).await {
                tracing::warn!(
                    topic = %topic,
                    peer = %peer,
                    error = %error,
                    "publish to peer failed, continuing fan-out"
                );
            }
        }

        Ok(())
    }

    async fn listen(&self, topic: &str, handler: MessageHandler) -> Result<()> {
        tracing::info!(topic = %topic, "listening for messages");
        self.router.register_handler(topic, handler);

        let callback = CallbackDescriptor {
            rest_hostname: self.config.callback_host.clone(),
            rest_port: self.config.callback_port,
            rest_path: format!("/messageCallback/{}", topic),
        };

        // On failure no subscription is recorded; the caller must re-issue
        // listen. The failover loop only heals subscriptions that were
        // established once, so the handler is unregistered again to keep the
        // router aligned with the registry.
        let outcome = async {
            let snapshot = self.membership.snapshot();
            let peer = self.balancer.next(&snapshot)?;
            self.subscriptions
                .establish(topic, callback, peer.clone(), self.client.as_ref())
                .await?;
            Ok(peer)
        }
        .await;

        match outcome {
            Ok(peer) => {
                tracing::info!(topic = %topic, peer = %peer, "subscribed at peer");
                Ok(())
            }
            Err(error) => {
                if self.subscriptions.view(topic).await.is_none() {
                    self.router.unregister_handler(topic);
                }
                Err(error)
            }
        }
    }

    async fn close(&self) -> Result<()> {
        let _ = self.shutdown.send(true);

        let drained: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().expect("tasks lock poisoned");
            tasks.drain(..).collect()
        };
        for task in drained {
            let _ = task.await;
        }

        Ok(())
    }
}
