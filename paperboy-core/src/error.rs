use thiserror::Error;

pub type Result<T> = std::result::Result<T, PaperboyError>;

#[derive(Error, Debug)]
pub enum PaperboyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Peer unreachable: {0}")]
    PeerUnreachable(String),

    #[error("No fabric peers available")]
    NoPeersAvailable,

    #[error("Invalid embedded backend token")]
    InvalidToken,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
