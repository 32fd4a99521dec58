//! Immutable snapshots of the whole topology.

use crate::address::ServerAddress;
use crate::description::{ServerConnectionState, ServerDescription};
use serde::Serialize;
use std::fmt;

/// How the cluster was asked to treat its seed list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConnectionMode {
    /// Pin to a single seed; membership never changes
    Single,
    /// Discover membership from the servers themselves
    #[default]
    Multiple,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Multiple => write!(f, "multiple"),
        }
    }
}

/// Classification of the deployment as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ClusterType {
    /// Not enough observations to classify yet
    #[default]
    Unknown,
    /// One primary plus secondaries sharing a set name
    ReplicaSet,
    /// Deployment accessed through shard routers
    Sharded,
    /// Single unreplicated server
    StandAlone,
}

impl fmt::Display for ClusterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::ReplicaSet => write!(f, "replica-set"),
            Self::Sharded => write!(f, "sharded"),
            Self::StandAlone => write!(f, "standalone"),
        }
    }
}

/// Immutable snapshot of the whole topology: mode, type, and one
/// [`ServerDescription`] per live member.
///
/// Members are held sorted by address, so two snapshots over the same member
/// set compare equal regardless of the order notifications arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterDescription {
    connection_mode: ConnectionMode,
    cluster_type: ClusterType,
    servers: Vec<ServerDescription>,
}

impl ClusterDescription {
    /// Build a snapshot from a set of member descriptions.
    pub fn new(
        connection_mode: ConnectionMode,
        cluster_type: ClusterType,
        servers: impl IntoIterator<Item = ServerDescription>,
    ) -> Self {
        let mut servers: Vec<_> = servers.into_iter().collect();
        servers.sort_by(|a, b| a.address.cmp(&b.address));
        Self {
            connection_mode,
            cluster_type,
            servers,
        }
    }

    /// The configured connection mode
    pub fn connection_mode(&self) -> ConnectionMode {
        self.connection_mode
    }

    /// The current cluster type
    pub fn cluster_type(&self) -> ClusterType {
        self.cluster_type
    }

    /// Member snapshots, sorted by address
    pub fn servers(&self) -> &[ServerDescription] {
        &self.servers
    }

    /// Member addresses, sorted
    pub fn addresses(&self) -> impl Iterator<Item = &ServerAddress> {
        self.servers.iter().map(|s| &s.address)
    }

    /// Look up the member snapshot for `address`.
    pub fn server(&self, address: &ServerAddress) -> Option<&ServerDescription> {
        self.servers.iter().find(|s| &s.address == address)
    }

    /// Whether `address` is currently a member.
    pub fn contains(&self, address: &ServerAddress) -> bool {
        self.server(address).is_some()
    }

    /// True while any member is still connecting, or no members exist at all.
    pub fn is_connecting(&self) -> bool {
        self.servers.is_empty()
            || self
                .servers
                .iter()
                .any(|s| s.state == ServerConnectionState::Connecting)
    }

    /// True once every member has connected and at least one member exists.
    ///
    /// This is the gate separating "keep waiting" from "no server will ever
    /// match" during selection.
    pub fn is_fully_connected(&self) -> bool {
        !self.servers.is_empty()
            && self
                .servers
                .iter()
                .all(|s| s.state == ServerConnectionState::Connected)
    }
}

impl fmt::Display for ClusterDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.cluster_type)?;
        for (i, server) in self.servers.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", server)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::ServerType;

    fn addr(s: &str) -> ServerAddress {
        s.parse().unwrap()
    }

    #[test]
    fn test_empty_description_is_connecting() {
        let desc = ClusterDescription::new(ConnectionMode::Multiple, ClusterType::Unknown, []);
        assert!(desc.is_connecting());
        assert!(!desc.is_fully_connected());
    }

    #[test]
    fn test_members_are_sorted_by_address() {
        let desc = ClusterDescription::new(
            ConnectionMode::Multiple,
            ClusterType::Unknown,
            [
                ServerDescription::connecting(addr("h2:27018")),
                ServerDescription::connecting(addr("h1:27017")),
            ],
        );
        let addresses: Vec<_> = desc.addresses().cloned().collect();
        assert_eq!(addresses, vec![addr("h1:27017"), addr("h2:27018")]);
    }

    #[test]
    fn test_equality_ignores_member_order() {
        let a = ClusterDescription::new(
            ConnectionMode::Multiple,
            ClusterType::Unknown,
            [
                ServerDescription::connecting(addr("h1:27017")),
                ServerDescription::connecting(addr("h2:27018")),
            ],
        );
        let b = ClusterDescription::new(
            ConnectionMode::Multiple,
            ClusterType::Unknown,
            [
                ServerDescription::connecting(addr("h2:27018")),
                ServerDescription::connecting(addr("h1:27017")),
            ],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_fully_connected_requires_every_member_connected() {
        let connected = ServerDescription::builder(addr("h1:27017"))
            .server_type(ServerType::StandAlone)
            .build();
        let connecting = ServerDescription::connecting(addr("h2:27018"));

        let mixed = ClusterDescription::new(
            ConnectionMode::Multiple,
            ClusterType::Unknown,
            [connected.clone(), connecting],
        );
        assert!(mixed.is_connecting());
        assert!(!mixed.is_fully_connected());

        let all = ClusterDescription::new(
            ConnectionMode::Multiple,
            ClusterType::StandAlone,
            [connected],
        );
        assert!(!all.is_connecting());
        assert!(all.is_fully_connected());
    }

    #[test]
    fn test_lookup_by_address() {
        let desc = ClusterDescription::new(
            ConnectionMode::Multiple,
            ClusterType::Unknown,
            [ServerDescription::connecting(addr("h1:27017"))],
        );
        assert!(desc.contains(&addr("h1:27017")));
        assert!(desc.server(&addr("h2:27018")).is_none());
    }
}
