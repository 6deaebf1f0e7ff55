//! Self-hosted peer messaging fabric.
//!
//! Cooperating node processes discover each other over mDNS, fan publishes
//! out to every known peer over HTTP, and keep queue-style subscriptions
//! pinned to exactly one serving peer, re-registering when that peer
//! restarts and migrating when it disappears.

mod backend;
mod balancer;
mod callback;
mod discovery;
mod membership;
mod subscription;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{EmbeddedBackend, EmbeddedConfig};
pub use balancer::RoundRobin;
pub use callback::CallbackRouter;
pub use discovery::{local_address, MdnsDiscovery, PeerDiscovery, SERVICE_TYPE};
pub use membership::{MembershipSnapshot, MembershipStore, PeerAddress};
pub use subscription::{SubscriptionView, Subscriptions};
pub use transport::{CallbackDescriptor, HttpPeerClient, PeerClient, TOKEN_HEADER};
