//! In-process topology monitor for multi-server database deployments.
//!
//! `topomon` is the piece of a database driver that keeps a live, consistent
//! view of a remote deployment: which servers exist, what role each one
//! holds, and whether the deployment is a replica set, a sharded cluster, or
//! a standalone server. It does no I/O itself — the enclosing driver probes
//! servers and pushes the results in as [`ServerDescription`]s; the monitor
//! merges them, adjusts membership from the peers servers advertise, fires
//! change events, and answers selection queries against the current
//! [`ClusterDescription`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use topomon::cluster::ClusterSettings;
//! use topomon::testing::TestServerFactory;
//! use topomon::{MultiServerCluster, ServerDescription, ServerType};
//!
//! let factory = Arc::new(TestServerFactory::new());
//! let settings = ClusterSettings::builder()
//!     .host("h1:27017".parse().unwrap())
//!     .build()
//!     .unwrap();
//! let cluster = MultiServerCluster::new(settings, factory.clone());
//!
//! // The heartbeat layer reports h1 as a replica-set primary with two peers.
//! factory.notify(
//!     ServerDescription::builder("h1:27017".parse().unwrap())
//!         .server_type(ServerType::ReplicaSetPrimary)
//!         .set_name("rs0")
//!         .hosts(["h1:27017".parse().unwrap(), "h2:27017".parse().unwrap()])
//!         .build(),
//! );
//!
//! let description = cluster.description();
//! assert_eq!(description.servers().len(), 2);
//! ```

pub mod address;
pub mod cluster;
pub mod description;
pub mod error;
pub mod selector;
pub mod testing;

pub use address::ServerAddress;
pub use cluster::{
    ClusterChangedEvent, ClusterListener, ClusterSettings, DefaultServerFactory,
    MultiServerCluster, Server, ServerFactory,
};
pub use description::{
    ClusterDescription, ClusterType, ConnectionMode, ServerConnectionState, ServerDescription,
    ServerType,
};
pub use error::{ClusterError, Result};
pub use selector::ServerSelector;
