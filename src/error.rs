use crate::address::ServerAddress;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Cluster has been closed")]
    Closed,

    #[error("No server at address: {0}")]
    ServerNotFound(ServerAddress),

    #[error("Timed out after {0:?} waiting for a matching server")]
    Timeout(Duration),

    #[error("No server matched the selector in a fully connected cluster")]
    NoMatchingServer,

    #[error("Server factory failed: {0}")]
    Factory(String),

    #[error("Invalid cluster settings: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, ClusterError>;
