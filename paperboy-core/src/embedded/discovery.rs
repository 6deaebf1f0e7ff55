use super::membership::PeerAddress;
use crate::error::{PaperboyError, Result};
use async_trait::async_trait;
use mdns_sd::{ServiceDaemon, ServiceEvent};
use std::net::{IpAddr, UdpSocket};
use std::time::{Duration, Instant};

/// Well-known mDNS service identifier advertised by every fabric node.
pub const SERVICE_TYPE: &str = "_paperboy-http._tcp.local.";

/// Queries the local network for fabric peers.
#[async_trait]
pub trait PeerDiscovery: Send + Sync {
    /// Run one discovery cycle and return every peer that answered within
    /// the cycle's window. No completeness guarantee; a peer that misses the
    /// window is simply absent from the result.
    async fn discover(&self) -> Result<Vec<PeerAddress>>;
}

/// mDNS-SD discovery of `_paperboy-http._tcp.local.` services.
pub struct MdnsDiscovery {
    service_type: String,
    window: Duration,
}

impl MdnsDiscovery {
    pub fn new(window: Duration) -> Self {
        Self {
            service_type: SERVICE_TYPE.to_string(),
            window,
        }
    }

    pub fn with_service_type(service_type: impl Into<String>, window: Duration) -> Self {
        Self {
            service_type: service_type.into(),
            window,
        }
    }
}

#[async_trait]
impl PeerDiscovery for MdnsDiscovery {
    async fn discover(&self) -> Result<Vec<PeerAddress>> {
        let service_type = self.service_type.clone();
        let window = self.window;

        // The mdns-sd receiver is blocking; keep it off the async workers.
        tokio::task::spawn_blocking(move || browse_once(&service_type, window))
            .await
            .map_err(|error| PaperboyError::Internal(format!("discovery task failed: {}", error)))?
    }
}

fn browse_once(service_type: &str, window: Duration) -> Result<Vec<PeerAddress>> {
    let daemon = ServiceDaemon::new()
        .map_err(|error| PaperboyError::Discovery(format!("mdns daemon failed: {}", error)))?;
    let receiver = daemon
        .browse(service_type)
        .map_err(|error| PaperboyError::Discovery(format!("mdns browse failed: {}", error)))?;

    let deadline = Instant::now() + window;
    let mut peers: Vec<PeerAddress> = Vec::new();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        match receiver.recv_timeout(remaining) {
            Ok(ServiceEvent::ServiceResolved(info)) => {
                if let Some(address) = info.get_addresses().iter().next() {
                    let peer = PeerAddress::new(address.to_string(), info.get_port());
                    tracing::info!(peer = %peer, "discovered fabric node");
                    if !peers.contains(&peer) {
                        peers.push(peer);
                    }
                }
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }

    let _ = daemon.stop_browse(service_type);
    let _ = daemon.shutdown();

    peers.sort_by(|left, right| (&left.host, left.port).cmp(&(&right.host, right.port)));
    Ok(peers)
}

/// Best-effort local address detection via a connected UDP socket.
///
/// No packet is sent; connecting only selects the outbound interface.
pub fn local_address() -> Result<IpAddr> {
    let socket = UdpSocket::bind(("0.0.0.0", 0))?;
    socket.connect(("8.8.8.8", 10002))?;
    Ok(socket.local_addr()?.ip())
}
