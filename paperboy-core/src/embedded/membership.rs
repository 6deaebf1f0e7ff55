use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};

/// Address of one fabric peer, produced by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddress {
    pub host: String,
    pub port: u16,
}

impl PeerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Immutable view of the fabric membership at one discovery cycle.
pub type MembershipSnapshot = Arc<Vec<PeerAddress>>;

/// Holds the current membership snapshot.
///
/// The snapshot is replaced wholesale on each discovery cycle; readers take
/// one `Arc` reference per operation and never observe a partial update.
pub struct MembershipStore {
    snapshot: RwLock<MembershipSnapshot>,
}

impl MembershipStore {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn snapshot(&self) -> MembershipSnapshot {
        Arc::clone(&self.snapshot.read().expect("membership lock poisoned"))
    }

    pub fn replace(&self, peers: Vec<PeerAddress>) {
        let mut guard = self.snapshot.write().expect("membership lock poisoned");
        *guard = Arc::new(peers);
    }
}

impl Default for MembershipStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_swaps_the_whole_snapshot() {
        let store = MembershipStore::new();
        assert!(store.snapshot().is_empty());

        store.replace(vec![PeerAddress::new("10.0.0.1", 8080)]);
        let first = store.snapshot();
        assert_eq!(first.len(), 1);

        store.replace(vec![
            PeerAddress::new("10.0.0.2", 8080),
            PeerAddress::new("10.0.0.3", 8080),
        ]);

        // The old reference still sees the old list; the store sees the new one.
        assert_eq!(first.len(), 1);
        assert_eq!(store.snapshot().len(), 2);
        assert_eq!(store.snapshot()[0].host, "10.0.0.2");
    }

    #[test]
    fn peer_address_formats_as_host_port() {
        let peer = PeerAddress::new("192.168.1.5", 9000);
        assert_eq!(peer.to_string(), "192.168.1.5:9000");
        assert_eq!(peer.base_url(), "http://192.168.1.5:9000");
    }
}
