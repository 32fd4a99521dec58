//! Immutable snapshots of a single server's last observed state.

use crate::address::ServerAddress;
use crate::description::ClusterType;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

/// Role a server reported in its most recent successful heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ServerType {
    /// Not yet observed, or the last heartbeat failed
    #[default]
    Unknown,
    /// Single-server deployment with no replication
    StandAlone,
    /// Replica-set member currently holding the primary role
    ReplicaSetPrimary,
    /// Replica-set member replicating from the primary
    ReplicaSetSecondary,
    /// Voting replica-set member that holds no data
    ReplicaSetArbiter,
    /// Replica-set member in a transitional state (e.g. hidden, recovering)
    ReplicaSetOther,
    /// Server that reports replication but no set membership yet
    ReplicaSetGhost,
    /// Router fronting a sharded cluster
    ShardRouter,
}

impl ServerType {
    /// Whether this type is one of the replica-set roles.
    pub fn is_replica_set_member(&self) -> bool {
        matches!(
            self,
            Self::ReplicaSetPrimary
                | Self::ReplicaSetSecondary
                | Self::ReplicaSetArbiter
                | Self::ReplicaSetOther
                | Self::ReplicaSetGhost
        )
    }

    /// The cluster type implied by a server of this type, if any.
    ///
    /// `Unknown` implies nothing, and `StandAlone` only implies a standalone
    /// cluster while the deployment has a single member — the size rule is
    /// applied by the caller.
    pub fn implied_cluster_type(&self) -> Option<ClusterType> {
        match self {
            Self::ShardRouter => Some(ClusterType::Sharded),
            Self::StandAlone => Some(ClusterType::StandAlone),
            Self::Unknown => None,
            _ => Some(ClusterType::ReplicaSet),
        }
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::StandAlone => "standalone",
            Self::ReplicaSetPrimary => "primary",
            Self::ReplicaSetSecondary => "secondary",
            Self::ReplicaSetArbiter => "arbiter",
            Self::ReplicaSetOther => "other",
            Self::ReplicaSetGhost => "ghost",
            Self::ShardRouter => "shard-router",
        };
        write!(f, "{}", name)
    }
}

/// Connection lifecycle state of a monitored server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ServerConnectionState {
    /// No successful heartbeat yet, or the last one failed
    #[default]
    Connecting,
    /// The last heartbeat succeeded
    Connected,
}

impl fmt::Display for ServerConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Immutable snapshot of a server's last observed state.
///
/// Snapshots are produced by the heartbeat layer and consumed by the cluster
/// state machine; the monitor never mutates one in place. Build connected
/// snapshots with [`ServerDescription::builder`]; the initial and
/// failed-heartbeat snapshot is [`ServerDescription::connecting`].
#[derive(Debug, Clone, Serialize)]
pub struct ServerDescription {
    /// Address this snapshot describes
    pub address: ServerAddress,
    /// Reported role
    pub server_type: ServerType,
    /// Connection lifecycle state
    pub state: ServerConnectionState,
    /// Whether the last heartbeat succeeded
    pub ok: bool,
    /// Peer addresses advertised by this server; empty when unknown
    pub hosts: BTreeSet<ServerAddress>,
    /// Replica-set name as reported
    pub set_name: Option<String>,
    /// Last measured heartbeat round-trip time; passed through uninterpreted
    pub round_trip_time: Option<Duration>,
    /// Arbitrary server tags; passed through uninterpreted
    pub tags: BTreeMap<String, String>,
    /// Newest wire-protocol version the server speaks; passed through
    /// uninterpreted
    pub max_wire_version: Option<i32>,
}

impl ServerDescription {
    /// The snapshot of a server that has not been reached yet: Unknown type,
    /// Connecting state, not ok.
    pub fn connecting(address: ServerAddress) -> Self {
        Self {
            address,
            server_type: ServerType::Unknown,
            state: ServerConnectionState::Connecting,
            ok: false,
            hosts: BTreeSet::new(),
            set_name: None,
            round_trip_time: None,
            tags: BTreeMap::new(),
            max_wire_version: None,
        }
    }

    /// Start building a connected snapshot for `address`.
    pub fn builder(address: ServerAddress) -> ServerDescriptionBuilder {
        ServerDescriptionBuilder {
            description: Self {
                address,
                server_type: ServerType::Unknown,
                state: ServerConnectionState::Connected,
                ok: true,
                hosts: BTreeSet::new(),
                set_name: None,
                round_trip_time: None,
                tags: BTreeMap::new(),
                max_wire_version: None,
            },
        }
    }

    /// Whether the cluster may act on this snapshot's membership claims.
    ///
    /// A failed heartbeat is unusable, and so is an impossible combination
    /// such as a replica-set role with no set name; the latter takes the same
    /// not-ok path through the state machine.
    pub fn is_usable(&self) -> bool {
        self.ok && !(self.server_type.is_replica_set_member() && self.set_name.is_none())
    }

    /// Whether this snapshot reports the primary role.
    pub fn is_primary(&self) -> bool {
        self.server_type == ServerType::ReplicaSetPrimary
    }
}

// Round-trip time does not participate in equality: a snapshot that differs
// only in measured latency is the same observation.
impl PartialEq for ServerDescription {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
            && self.server_type == other.server_type
            && self.state == other.state
            && self.ok == other.ok
            && self.hosts == other.hosts
            && self.set_name == other.set_name
            && self.tags == other.tags
            && self.max_wire_version == other.max_wire_version
    }
}

impl Eq for ServerDescription {}

impl fmt::Display for ServerDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}/{}",
            self.address, self.server_type, self.state
        )
    }
}

/// Builder for [`ServerDescription`].
///
/// Defaults to a Connected, ok snapshot of Unknown type. Setting `ok(false)`
/// forces the Unknown/Connecting combination so that every built snapshot
/// satisfies the invariant tying the three fields together.
#[derive(Debug)]
pub struct ServerDescriptionBuilder {
    description: ServerDescription,
}

impl ServerDescriptionBuilder {
    /// Set the reported role.
    pub fn server_type(mut self, server_type: ServerType) -> Self {
        self.description.server_type = server_type;
        self
    }

    /// Mark the heartbeat outcome.
    pub fn ok(mut self, ok: bool) -> Self {
        self.description.ok = ok;
        self
    }

    /// Set the advertised peer addresses.
    pub fn hosts(mut self, hosts: impl IntoIterator<Item = ServerAddress>) -> Self {
        self.description.hosts = hosts.into_iter().collect();
        self
    }

    /// Set the reported replica-set name.
    pub fn set_name(mut self, set_name: impl Into<String>) -> Self {
        self.description.set_name = Some(set_name.into());
        self
    }

    /// Record the measured round-trip time.
    pub fn round_trip_time(mut self, rtt: Duration) -> Self {
        self.description.round_trip_time = Some(rtt);
        self
    }

    /// Add a server tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.description.tags.insert(key.into(), value.into());
        self
    }

    /// Set the newest supported wire-protocol version.
    pub fn max_wire_version(mut self, version: i32) -> Self {
        self.description.max_wire_version = Some(version);
        self
    }

    /// Finish the snapshot.
    pub fn build(mut self) -> ServerDescription {
        if !self.description.ok {
            self.description.server_type = ServerType::Unknown;
            self.description.state = ServerConnectionState::Connecting;
        }
        self.description
    }
}
