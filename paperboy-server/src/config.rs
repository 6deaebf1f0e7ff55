use paperboy_core::{PaperboyError, Result, SERVICE_TYPE};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    pub fabric: FabricConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Address advertised over mDNS. Detected from the outbound interface
    /// when unset.
    #[serde(default)]
    pub advertise_host: Option<String>,
}

impl NodeConfig {
    pub fn port(&self) -> Result<u16> {
        let addr: SocketAddr = self.bind_addr.parse().map_err(|_| {
            PaperboyError::Config(format!(
                "invalid bind_addr '{}': expected host:port",
                self.bind_addr
            ))
        })?;
        Ok(addr.port())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricConfig {
    /// Shared bearer secret; every node and connector must carry the same one.
    pub token: String,
    #[serde(default = "default_service_type")]
    pub service_type: String,
    #[serde(default = "default_forward_timeout_secs")]
    pub forward_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_service_type() -> String {
    SERVICE_TYPE.to_string()
}

fn default_forward_timeout_secs() -> u64 {
    5
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(::config::Environment::with_prefix("PAPERBOY"))
            .build()
            .map_err(|e| PaperboyError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| PaperboyError::Config(e.to_string()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_port_is_parsed_from_bind_addr() {
        let node = NodeConfig {
            bind_addr: "0.0.0.0:9090".to_string(),
            advertise_host: None,
        };
        assert_eq!(node.port().expect("port"), 9090);
    }

    #[test]
    fn malformed_bind_addr_is_a_config_error() {
        let node = NodeConfig {
            bind_addr: "not-an-address".to_string(),
            advertise_host: None,
        };
        assert!(matches!(node.port(), Err(PaperboyError::Config(_))));
    }
}
