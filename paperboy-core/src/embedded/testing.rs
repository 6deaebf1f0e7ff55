//! Test doubles for the fabric's discovery and transport seams.

use super::membership::PeerAddress;
use super::transport::{CallbackDescriptor, PeerClient};
use crate::error::{PaperboyError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RecordedCall {
    Push { peer: String, topic: String },
    Subscribe { peer: String, topic: String },
    Probe { peer: String },
    Deliver { path: String },
}

/// In-memory [`PeerClient`] recording every call.
///
/// Peers are keyed by their `host:port` display form. A peer marked down
/// fails every call with `PeerUnreachable`; otherwise probes answer with the
/// configured instance id (or `"default"`).
pub(crate) struct MockPeerClient {
    calls: Mutex<Vec<RecordedCall>>,
    instance_ids: Mutex<HashMap<String, String>>,
    down: Mutex<HashSet<String>>,
    holds: Mutex<HashMap<String, watch::Receiver<bool>>>,
}

impl MockPeerClient {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            instance_ids: Mutex::new(HashMap::new()),
            down: Mutex::new(HashSet::new()),
            holds: Mutex::new(HashMap::new()),
        }
    }

    /// Stall probes of `peer` until the returned sender publishes `true`
    /// (or is dropped).
    pub(crate) fn hold_probes(&self, peer: &str) -> watch::Sender<bool> {
        let (release, gate) = watch::channel(false);
        self.holds
            .lock()
            .expect("holds lock")
            .insert(peer.to_string(), gate);
        release
    }

    pub(crate) fn set_instance_id(&self, peer: &str, instance_id: &str) {
        self.instance_ids
            .lock()
            .expect("instance ids lock")
            .insert(peer.to_string(), instance_id.to_string());
    }

    pub(crate) fn set_down(&self, peer: &str) {
        self.down.lock().expect("down lock").insert(peer.to_string());
    }

    pub(crate) fn set_up(&self, peer: &str) {
        self.down.lock().expect("down lock").remove(peer);
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn count_pushes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, RecordedCall::Push { .. }))
            .count()
    }

    pub(crate) fn count_subscribes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, RecordedCall::Subscribe { .. }))
            .count()
    }

    pub(crate) fn count_probes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, RecordedCall::Probe { .. }))
            .count()
    }

    fn check_reachable(&self, peer: &str) -> Result<()> {
        if self.down.lock().expect("down lock").contains(peer) {
            return Err(PaperboyError::PeerUnreachable(format!(
                "peer {} is down",
                peer
            )));
        }
        Ok(())
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl PeerClient for MockPeerClient {
    async fn push_message(&self, peer: &PeerAddress, topic: &str, _message: &Value) -> Result<()> {
        let key = peer.to_string();
        self.record(RecordedCall::Push {
            peer: key.clone(),
            topic: topic.to_string(),
        });
        self.check_reachable(&key)
    }

    async fn subscribe_topic(
        &self,
        peer: &PeerAddress,
        topic: &str,
        _callback: &CallbackDescriptor,
    ) -> Result<()> {
        let key = peer.to_string();
        self.record(RecordedCall::Subscribe {
            peer: key.clone(),
            topic: topic.to_string(),
        });
        self.check_reachable(&key)
    }

    async fn instance_id(&self, peer: &PeerAddress) -> Result<String> {
        let key = peer.to_string();
        self.record(RecordedCall::Probe { peer: key.clone() });

        let gate = self.holds.lock().expect("holds lock").get(&key).cloned();
        if let Some(mut gate) = gate {
            while !*gate.borrow() {
                if gate.changed().await.is_err() {
                    break;
                }
            }
        }

        self.check_reachable(&key)?;

        Ok(self
            .instance_ids
            .lock()
            .expect("instance ids lock")
            .get(&key)
            .cloned()
            .unwrap_or_else(|| "default".to_string()))
    }

    async fn deliver(&self, callback: &CallbackDescriptor, _message: &Value) -> Result<()> {
        self.record(RecordedCall::Deliver {
            path: callback.rest_path.clone(),
        });
        Ok(())
    }
}

/// [`super::PeerDiscovery`] double answering with a fixed peer list.
pub(crate) struct StaticDiscovery {
    peers: Mutex<Vec<PeerAddress>>,
}

impl StaticDiscovery {
    pub(crate) fn new(peers: Vec<PeerAddress>) -> Self {
        Self {
            peers: Mutex::new(peers),
        }
    }

    pub(crate) fn set_peers(&self, peers: Vec<PeerAddress>) {
        *self.peers.lock().expect("peers lock") = peers;
    }
}

#[async_trait]
impl super::discovery::PeerDiscovery for StaticDiscovery {
    async fn discover(&self) -> Result<Vec<PeerAddress>> {
        Ok(self.peers.lock().expect("peers lock").clone())
    }
}
