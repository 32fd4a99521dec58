//! Immutable topology snapshots.
//!
//! Descriptions flow one way: the heartbeat layer produces
//! [`ServerDescription`]s, the cluster state machine merges them, and
//! observers read the resulting [`ClusterDescription`]. Nothing in this
//! module is mutated after construction.

mod cluster;
mod server;

pub use cluster::{ClusterDescription, ClusterType, ConnectionMode};
pub use server::{
    ServerConnectionState, ServerDescription, ServerDescriptionBuilder, ServerType,
};
