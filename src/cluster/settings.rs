//! Cluster construction settings.

use crate::address::ServerAddress;
use crate::description::{ClusterType, ConnectionMode};
use crate::error::{ClusterError, Result};
use serde::Serialize;

/// Immutable configuration a cluster is created from.
///
/// Built through [`ClusterSettings::builder`], which validates the
/// combination of fields before any monitoring starts.
///
/// # Example
///
/// ```
/// use topomon::cluster::ClusterSettings;
///
/// let settings = ClusterSettings::builder()
///     .host("h1.example.com:27017".parse().unwrap())
///     .host("h2.example.com:27017".parse().unwrap())
///     .required_replica_set_name("rs0")
///     .build()
///     .unwrap();
/// assert_eq!(settings.hosts().len(), 2);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSettings {
    mode: ConnectionMode,
    hosts: Vec<ServerAddress>,
    required_cluster_type: Option<ClusterType>,
    required_replica_set_name: Option<String>,
}

impl ClusterSettings {
    /// Start building settings.
    pub fn builder() -> ClusterSettingsBuilder {
        ClusterSettingsBuilder {
            mode: ConnectionMode::Multiple,
            hosts: Vec::new(),
            required_cluster_type: None,
            required_replica_set_name: None,
        }
    }

    /// The connection mode
    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    /// The seed list, deduplicated, in the order given
    pub fn hosts(&self) -> &[ServerAddress] {
        &self.hosts
    }

    /// The pinned cluster type, if any
    pub fn required_cluster_type(&self) -> Option<ClusterType> {
        self.required_cluster_type
    }

    /// The required replica-set name, if any
    pub fn required_replica_set_name(&self) -> Option<&str> {
        self.required_replica_set_name.as_deref()
    }
}

/// Builder for [`ClusterSettings`].
#[derive(Debug)]
pub struct ClusterSettingsBuilder {
    mode: ConnectionMode,
    hosts: Vec<ServerAddress>,
    required_cluster_type: Option<ClusterType>,
    required_replica_set_name: Option<String>,
}

impl ClusterSettingsBuilder {
    /// Set the connection mode. Defaults to [`ConnectionMode::Multiple`].
    pub fn mode(mut self, mode: ConnectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replace the seed list.
    pub fn hosts(mut self, hosts: impl IntoIterator<Item = ServerAddress>) -> Self {
        self.hosts = hosts.into_iter().collect();
        self
    }

    /// Append one seed address.
    pub fn host(mut self, host: ServerAddress) -> Self {
        self.hosts.push(host);
        self
    }

    /// Pin the cluster type; reports implying a different type remove their
    /// sender from the topology.
    pub fn required_cluster_type(mut self, cluster_type: ClusterType) -> Self {
        self.required_cluster_type = Some(cluster_type);
        self
    }

    /// Require a replica-set name; members reporting a different set are
    /// rejected. Implies a required cluster type of
    /// [`ClusterType::ReplicaSet`].
    pub fn required_replica_set_name(mut self, name: impl Into<String>) -> Self {
        self.required_replica_set_name = Some(name.into());
        self
    }

    /// Validate and build the settings.
    pub fn build(self) -> Result<ClusterSettings> {
        let mut hosts: Vec<ServerAddress> = Vec::with_capacity(self.hosts.len());
        for host in self.hosts {
            if !hosts.contains(&host) {
                hosts.push(host);
            }
        }

        if hosts.is_empty() {
            return Err(ClusterError::Configuration(
                "seed list must not be empty".to_string(),
            ));
        }
        if self.mode == ConnectionMode::Single && hosts.len() != 1 {
            return Err(ClusterError::Configuration(format!(
                "single mode requires exactly one seed, got {}",
                hosts.len()
            )));
        }

        let required_cluster_type = match (&self.required_replica_set_name, self.required_cluster_type)
        {
            (Some(_), None) => Some(ClusterType::ReplicaSet),
            (Some(_), Some(ClusterType::ReplicaSet)) => Some(ClusterType::ReplicaSet),
            (Some(_), Some(other)) => {
                return Err(ClusterError::Configuration(format!(
                    "a required replica-set name is incompatible with required cluster type '{}'",
                    other
                )))
            }
            (None, Some(ClusterType::Unknown)) => {
                return Err(ClusterError::Configuration(
                    "cannot require the unknown cluster type".to_string(),
                ))
            }
            (None, required) => required,
        };

        Ok(ClusterSettings {
            mode: self.mode,
            hosts,
            required_cluster_type,
            required_replica_set_name: self.required_replica_set_name,
        })
    }
}
