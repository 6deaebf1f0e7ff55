//! Paperboy Core - push messaging for users and channels over a pluggable fabric

pub mod backend;
pub mod embedded;
pub mod error;
pub mod message;
pub mod service;

pub use backend::{MessageHandler, MessagingBackend};
pub use embedded::{
    local_address, CallbackDescriptor, CallbackRouter, EmbeddedBackend, EmbeddedConfig,
    HttpPeerClient, MdnsDiscovery, MembershipSnapshot, MembershipStore, PeerAddress, PeerClient,
    PeerDiscovery, RoundRobin, SERVICE_TYPE, TOKEN_HEADER,
};
pub use error::{PaperboyError, Result};
pub use message::{AuthorizationMessage, Message};
pub use service::{
    MessagingService, SubscriptionAuthorizer, SubscriptionObserver, MESSAGE_TOPIC,
    SUBSCRIPTION_AUTHORIZED_TOPIC, SUBSCRIPTION_CLOSE_TOPIC, SUBSCRIPTION_REQUEST_TOPIC,
};
