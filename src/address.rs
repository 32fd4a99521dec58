//! Server endpoint identity.

use crate::error::{ClusterError, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Port assumed when an address string omits one
pub const DEFAULT_PORT: u16 = 27017;

/// Identity of a single server endpoint.
///
/// Two addresses are equal iff host and port match, with the host compared
/// case-insensitively. The host is lowercased at construction so the derived
/// `Eq`/`Ord`/`Hash` implementations see canonical values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    /// Create an address from a host and port. The host is normalized to
    /// lowercase.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into().to_lowercase(),
            port,
        }
    }

    /// The normalized (lowercase) host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            // Bare IPv6 hosts are bracketed so the rendering round-trips
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ServerAddress {
    type Err = ClusterError;

    /// Parse `"host"`, `"host:port"`, `"[v6addr]"`, or `"[v6addr]:port"`,
    /// defaulting the port to [`DEFAULT_PORT`] when absent.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ClusterError::Configuration(
                "empty server address".to_string(),
            ));
        }

        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| {
                ClusterError::Configuration(format!("unterminated '[' in address '{}'", s))
            })?;
            let port = match tail.strip_prefix(':') {
                Some(p) => p.parse().map_err(|_| {
                    ClusterError::Configuration(format!("invalid port in address '{}'", s))
                })?,
                None if tail.is_empty() => DEFAULT_PORT,
                None => {
                    return Err(ClusterError::Configuration(format!(
                        "trailing garbage in address '{}'",
                        s
                    )))
                }
            };
            return Ok(Self::new(host, port));
        }

        match s.rsplit_once(':') {
            // A single ':' separates host and port; more than one means an
            // unbracketed IPv6 literal.
            Some((host, port)) if !host.contains(':') => {
                let port = port.parse().map_err(|_| {
                    ClusterError::Configuration(format!("invalid port in address '{}'", s))
                })?;
                Ok(Self::new(host, port))
            }
            Some(_) => Ok(Self::new(s, DEFAULT_PORT)),
            None => Ok(Self::new(s, DEFAULT_PORT)),
        }
    }
}
