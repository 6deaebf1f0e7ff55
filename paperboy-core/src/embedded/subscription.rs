use super::balancer::RoundRobin;
use super::membership::{MembershipStore, PeerAddress};
use super::transport::{CallbackDescriptor, PeerClient};
use crate::error::Result;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// Mutable part of a subscription.
///
/// Callback, peer, and instance id sit behind one `Mutex` so they are always
/// replaced together, never observed half-updated, and so a foreground
/// re-listen serializes with a failover pass touching the same topic.
#[derive(Debug, Clone)]
struct ServingState {
    callback: CallbackDescriptor,
    peer: PeerAddress,
    instance_id: String,
}

struct SubscriptionEntry {
    state: Mutex<ServingState>,
}

/// Read-only view of one subscription for callers and tests.
#[derive(Debug, Clone)]
pub struct SubscriptionView {
    pub topic: String,
    pub serving_peer: PeerAddress,
    pub serving_instance_id: String,
    pub callback: CallbackDescriptor,
}

/// Per-topic record of queue-style subscriptions, at most one per topic.
pub struct Subscriptions {
    entries: RwLock<HashMap<String, Arc<SubscriptionEntry>>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Establish (or re-establish) the subscription for a topic by
    /// subscribing at `peer` and capturing its instance id.
    ///
    /// For a topic that already has an entry, the state lock is held across
    /// the subscribe and probe, so an in-flight failover pass for the same
    /// topic finishes first and the registry always reflects the newest
    /// successful registration. On failure the previous state is kept.
    pub async fn establish(
        &self,
        topic: &str,
        callback: CallbackDescriptor,
        peer: PeerAddress,
        client: &dyn PeerClient,
    ) -> Result<()> {
        let existing = self
            .entries
            .read()
            .expect("subscriptions lock poisoned")
            .get(topic)
            .cloned();

        if let Some(entry) = existing {
            let mut state = entry.state.lock().await;
            client.subscribe_topic(&peer, topic, &callback).await?;
            let instance_id = client.instance_id(&peer).await?;
            *state = ServingState {
                callback,
                peer,
                instance_id,
            };
            return Ok(());
        }

        client.subscribe_topic(&peer, topic, &callback).await?;
        let instance_id = client.instance_id(&peer).await?;
        let entry = Arc::new(SubscriptionEntry {
            state: Mutex::new(ServingState {
                callback,
                peer,
                instance_id,
            }),
        });
        self.entries
            .write()
            .expect("subscriptions lock poisoned")
            .insert(topic.to_string(), entry);
        Ok(())
    }

    pub async fn view(&self, topic: &str) -> Option<SubscriptionView> {
        let entry = self
            .entries
            .read()
            .expect("subscriptions lock poisoned")
            .get(topic)
            .cloned()?;

        let state = entry.state.lock().await;
        Some(SubscriptionView {
            topic: topic.to_string(),
            serving_peer: state.peer.clone(),
            serving_instance_id: state.instance_id.clone(),
            callback: state.callback.clone(),
        })
    }

    /// One failover pass over every active subscription.
    ///
    /// A changed instance id means the serving peer restarted and lost its
    /// in-memory registration: re-subscribe there and adopt the new id. An
    /// unreachable peer triggers migration to the next peer from the
    /// balancer; if that fails too, the entry is left unchanged and retried
    /// on the next tick. This loop never gives up.
    pub async fn failover_tick(
        &self,
        membership: &MembershipStore,
        balancer: &RoundRobin,
        client: &dyn PeerClient,
    ) {
        let entries: Vec<(String, Arc<SubscriptionEntry>)> = self
            .entries
            .read()
            .expect("subscriptions lock poisoned")
            .iter()
            .map(|(topic, entry)| (topic.clone(), Arc::clone(entry)))
            .collect();

        for (topic, entry) in entries {
            let mut state = entry.state.lock().await;

            match client.instance_id(&state.peer).await {
                Ok(current) if current == state.instance_id => {}
                Ok(current) => {
                    tracing::info!(
                        topic = %topic,
                        peer = %state.peer,
                        "serving peer restarted, re-registering subscription"
                    );
                    match client
                        .subscribe_topic(&state.peer, &topic, &state.callback)
                        .await
                    {
                        Ok(()) => state.instance_id = current,
                        Err(error) => tracing::warn!(
                            topic = %topic,
                            peer = %state.peer,
                            error = %error,
                            "re-registration failed, retrying on next tick"
                        ),
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        topic = %topic,
                        peer = %state.peer,
                        error = %error,
                        "serving peer unreachable, migrating subscription"
                    );
                    let callback = state.callback.clone();
                    match migrate(membership, balancer, client, &topic, &callback).await {
                        Ok(adopted) => {
                            tracing::info!(
                                topic = %topic,
                                peer = %adopted.peer,
                                "subscription migrated"
                            );
                            *state = adopted;
                        }
                        Err(error) => tracing::warn!(
                            topic = %topic,
                            error = %error,
                            "failover attempt failed, retrying on next tick"
                        ),
                    }
                }
            }
        }
    }
}

impl Default for Subscriptions {
    fn default() -> Self {
        Self::new()
    }
}

async fn migrate(
    membership: &MembershipStore,
    balancer: &RoundRobin,
    client: &dyn PeerClient,
    topic: &str,
    callback: &CallbackDescriptor,
) -> Result<ServingState> {
    let snapshot = membership.snapshot();
    let candidate = balancer.next(&snapshot)?;

    let instance_id = client.instance_id(&candidate).await?;
    client.subscribe_topic(&candidate, topic, callback).await?;

    Ok(ServingState {
        callback: callback.clone(),
        peer: candidate,
        instance_id,
    })
}
