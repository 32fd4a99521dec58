//! The cluster state machine.

use crate::address::ServerAddress;
use crate::cluster::factory::ServerFactory;
use crate::cluster::listener::{ClusterChangedEvent, ClusterListener, ListenerRegistry};
use crate::cluster::server::{NotificationCallback, Server};
use crate::cluster::settings::ClusterSettings;
use crate::description::{
    ClusterDescription, ClusterType, ConnectionMode, ServerDescription, ServerType,
};
use crate::error::{ClusterError, Result};
use crate::selector::ServerSelector;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What a server description implies about the cluster type.
enum Implication {
    /// No claim (the server has not been classified)
    None,
    /// The report can never fit the deployment, whatever its type
    WrongType,
    /// The deployment is of this type
    Type(ClusterType),
}

fn implication(description: &ServerDescription, member_count: usize) -> Implication {
    match description.server_type.implied_cluster_type() {
        None => Implication::None,
        // A standalone can only be the whole deployment
        Some(ClusterType::StandAlone) if member_count > 1 => Implication::WrongType,
        Some(cluster_type) => Implication::Type(cluster_type),
    }
}

/// Live, listener-observable view of a multi-server deployment.
///
/// The cluster owns one [`Server`] handle per member. Heartbeat results
/// pushed into those handles drive a state machine that adjusts membership
/// (servers advertise their peers), tracks the cluster type, demotes stale
/// primaries, and publishes an immutable [`ClusterDescription`] after every
/// change.
///
/// All state transitions run under one internal lock, so observers never see
/// a half-reconciled topology; [`description`](MultiServerCluster::description)
/// reads the last published snapshot without taking that lock.
///
/// Closing the cluster (explicitly or by dropping it) tears down every
/// member handle and fails all pending and future queries with
/// [`ClusterError::Closed`].
pub struct MultiServerCluster {
    inner: Arc<ClusterInner>,
}

struct ClusterInner {
    settings: ClusterSettings,
    factory: Arc<dyn ServerFactory>,
    state: Mutex<ClusterState>,
    published: RwLock<Arc<ClusterDescription>>,
    membership_changed: Condvar,
    /// Shared callback installed on every created server; set once right
    /// after construction. It holds only a weak reference, so server handles
    /// never keep a dropped cluster alive.
    callback: OnceLock<NotificationCallback>,
}

struct ClusterState {
    members: HashMap<ServerAddress, Arc<Server>>,
    cluster_type: ClusterType,
    /// Replica-set name the cluster has committed to
    set_name: Option<String>,
    listeners: ListenerRegistry,
    closed: bool,
}

impl MultiServerCluster {
    /// Start monitoring the deployment described by `settings`.
    ///
    /// One `Server` is created per seed address; a factory failure logs a
    /// warning and the cluster continues without that seed. The initial
    /// description has every surviving seed in Connecting state.
    pub fn new(settings: ClusterSettings, factory: Arc<dyn ServerFactory>) -> Self {
        let initial_type = settings.required_cluster_type().unwrap_or_default();
        let initial = Arc::new(ClusterDescription::new(settings.mode(), initial_type, []));
        let set_name = settings.required_replica_set_name().map(str::to_string);

        let inner = Arc::new(ClusterInner {
            settings,
            factory,
            state: Mutex::new(ClusterState {
                members: HashMap::new(),
                cluster_type: initial_type,
                set_name,
                listeners: ListenerRegistry::new(),
                closed: false,
            }),
            published: RwLock::new(initial),
            membership_changed: Condvar::new(),
            callback: OnceLock::new(),
        });

        let weak = Arc::downgrade(&inner);
        let _ = inner.callback.set(Arc::new(move |description| {
            if let Some(inner) = weak.upgrade() {
                inner.on_notification(description);
            }
        }));

        {
            let mut state = inner.lock_state();
            let seeds: Vec<ServerAddress> = inner.settings.hosts().to_vec();
            for seed in &seeds {
                inner.add_member(&mut state, seed);
            }
            inner.publish(&mut state);
        }
        info!(
            mode = %inner.settings.mode(),
            seeds = inner.settings.hosts().len(),
            "cluster monitor started"
        );

        Self { inner }
    }

    /// The settings this cluster was created from
    pub fn settings(&self) -> &ClusterSettings {
        &self.inner.settings
    }

    /// The last published cluster description. Never blocks on the state
    /// machine.
    pub fn description(&self) -> Arc<ClusterDescription> {
        self.inner
            .published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The monitor handle for `address`, if it is currently a member.
    pub fn server_at(&self, address: &ServerAddress) -> Result<Arc<Server>> {
        let state = self.inner.lock_state();
        if state.closed {
            return Err(ClusterError::Closed);
        }
        state
            .members
            .get(address)
            .cloned()
            .ok_or_else(|| ClusterError::ServerNotFound(address.clone()))
    }

    /// Apply `selector` to the current description, waiting up to `timeout`
    /// for a matching member to appear.
    ///
    /// Returns the handle of the first selected member still present. Fails
    /// with [`ClusterError::NoMatchingServer`] once the cluster is fully
    /// connected and the selector still matches nothing, with
    /// [`ClusterError::Timeout`] when `timeout` elapses first, and with
    /// [`ClusterError::Closed`] if the cluster is (or becomes) closed.
    pub fn select_server(
        &self,
        selector: &dyn ServerSelector,
        timeout: Duration,
    ) -> Result<Arc<Server>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.lock_state();
        loop {
            if state.closed {
                return Err(ClusterError::Closed);
            }

            let description = self.description();
            let selected = selector.select(&description);
            for candidate in &selected {
                if let Some(server) = state.members.get(&candidate.address) {
                    return Ok(Arc::clone(server));
                }
            }
            if selected.is_empty() && description.is_fully_connected() {
                return Err(ClusterError::NoMatchingServer);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ClusterError::Timeout(timeout));
            }
            let (guard, _) = self
                .inner
                .membership_changed
                .wait_timeout(state, remaining)
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
        }
    }

    /// Register a change listener. It observes every description change
    /// published after this call, in registration order relative to other
    /// listeners.
    pub fn add_listener(&self, listener: Arc<dyn ClusterListener>) {
        self.inner.lock_state().listeners.add(listener);
    }

    /// Remove a previously registered listener by identity. Idempotent.
    pub fn remove_listener(&self, listener: &Arc<dyn ClusterListener>) {
        self.inner.lock_state().listeners.remove(listener);
    }

    /// Shut the cluster down: close every member handle, publish the final
    /// (empty) description, and fail all pending waiters. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }
}

impl Drop for MultiServerCluster {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl ClusterInner {
    fn lock_state(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A server description arrived. Runs the whole merge algorithm under
    /// the state lock.
    fn on_notification(&self, description: ServerDescription) {
        let mut state = self.lock_state();

        if state.closed {
            return;
        }
        if !state.members.contains_key(&description.address) {
            debug!(
                address = %description.address,
                "ignoring notification from an address that is not a member"
            );
            return;
        }
        if !description.is_usable() {
            // The server handle already stores the failed snapshot; only the
            // published view needs refreshing.
            debug!(address = %description.address, "heartbeat not ok; membership unchanged");
            self.publish(&mut state);
            return;
        }

        match self.settings.mode() {
            ConnectionMode::Single => self.apply_single(&mut state, &description),
            ConnectionMode::Multiple => self.apply_multiple(&mut state, &description),
        }
        self.publish(&mut state);
    }

    /// Membership-adjusting path for [`ConnectionMode::Multiple`].
    fn apply_multiple(&self, state: &mut ClusterState, d: &ServerDescription) {
        // Required replica-set name filter
        if let Some(required) = self.settings.required_replica_set_name() {
            if d.set_name.as_deref() != Some(required) {
                warn!(
                    address = %d.address,
                    set_name = ?d.set_name,
                    required,
                    "removing member reporting the wrong replica set"
                );
                self.remove_member(state, &d.address);
                return;
            }
        }

        // Required cluster type filter
        let implied = implication(d, state.members.len());
        if let Some(required) = self.settings.required_cluster_type() {
            let incompatible = match &implied {
                Implication::Type(cluster_type) => *cluster_type != required,
                Implication::WrongType => true,
                Implication::None => false,
            };
            if incompatible {
                warn!(
                    address = %d.address,
                    server_type = %d.server_type,
                    required = %required,
                    "removing member incompatible with the required cluster type"
                );
                self.remove_member(state, &d.address);
                return;
            }
        }

        // First classification wins the cluster type
        if state.cluster_type == ClusterType::Unknown {
            if let Implication::Type(cluster_type) = implied {
                info!(cluster_type = %cluster_type, "cluster type established");
                state.cluster_type = cluster_type;
            }
        }
        if state.cluster_type == ClusterType::ReplicaSet && state.set_name.is_none() {
            state.set_name = d.set_name.clone();
        }

        // Reports that contradict the established type remove their sender
        let wrong_type = match state.cluster_type {
            ClusterType::ReplicaSet => {
                matches!(
                    d.server_type,
                    ServerType::StandAlone | ServerType::ShardRouter
                ) || (d.server_type.is_replica_set_member() && d.set_name != state.set_name)
            }
            ClusterType::Sharded => {
                d.server_type != ServerType::ShardRouter && d.server_type != ServerType::Unknown
            }
            ClusterType::StandAlone => {
                d.server_type != ServerType::StandAlone && d.server_type != ServerType::Unknown
            }
            ClusterType::Unknown => false,
        };
        if wrong_type {
            warn!(
                address = %d.address,
                server_type = %d.server_type,
                cluster_type = %state.cluster_type,
                "removing member that contradicts the established cluster type"
            );
            self.remove_member(state, &d.address);
            return;
        }

        // A new primary demotes every other member still believed primary
        if d.is_primary() {
            for (address, server) in &state.members {
                if address != &d.address && server.description().is_primary() {
                    debug!(
                        demoted = %address,
                        new_primary = %d.address,
                        "demoting stale primary"
                    );
                    server.replace_description(ServerDescription::connecting(address.clone()));
                }
            }
        }

        // Peer reconciliation: a non-empty hosts list from a replica-set
        // member or shard router is authoritative for membership. An empty
        // list means the peers are unknown and adjusts nothing.
        if (d.server_type.is_replica_set_member() || d.server_type == ServerType::ShardRouter)
            && !d.hosts.is_empty()
        {
            for host in &d.hosts {
                if !state.members.contains_key(host) {
                    self.add_member(state, host);
                }
            }
            let stale: Vec<ServerAddress> = state
                .members
                .keys()
                .filter(|address| !d.hosts.contains(address))
                .cloned()
                .collect();
            for address in stale {
                self.remove_member(state, &address);
            }
        }

        // A standalone cannot coexist with other members
        if state.members.len() > 1 {
            let standalone: Vec<ServerAddress> = state
                .members
                .iter()
                .filter(|(_, server)| server.description().server_type == ServerType::StandAlone)
                .map(|(address, _)| address.clone())
                .collect();
            for address in standalone {
                debug!(
                    address = %address,
                    "removing standalone member from a multi-server topology"
                );
                self.remove_member(state, &address);
            }
        }
    }

    /// Fixed-membership path for [`ConnectionMode::Single`]: the seed is
    /// never removed; reports that violate the cluster's constraints are
    /// surfaced as a Connecting/Unknown snapshot instead.
    fn apply_single(&self, state: &mut ClusterState, d: &ServerDescription) {
        let implied = implication(d, 1);

        let mut masked = false;
        if let Some(required) = self.settings.required_replica_set_name() {
            masked |= d.set_name.as_deref() != Some(required);
        }
        if let Some(required) = self.settings.required_cluster_type() {
            if let Implication::Type(cluster_type) = &implied {
                masked |= *cluster_type != required;
            }
        }
        if state.cluster_type != ClusterType::Unknown {
            if let Implication::Type(cluster_type) = &implied {
                masked |= *cluster_type != state.cluster_type;
            }
            if state.cluster_type == ClusterType::ReplicaSet
                && d.server_type.is_replica_set_member()
                && state.set_name.is_some()
            {
                masked |= d.set_name != state.set_name;
            }
        }

        if masked {
            debug!(
                address = %d.address,
                server_type = %d.server_type,
                "masking report that violates cluster constraints"
            );
            if let Some(server) = state.members.get(&d.address) {
                server.replace_description(ServerDescription::connecting(d.address.clone()));
            }
            return;
        }

        if state.cluster_type == ClusterType::Unknown {
            if let Implication::Type(cluster_type) = implied {
                info!(cluster_type = %cluster_type, "cluster type established");
                state.cluster_type = cluster_type;
            }
        }
        if state.cluster_type == ClusterType::ReplicaSet && state.set_name.is_none() {
            state.set_name = d.set_name.clone();
        }
    }

    fn add_member(&self, state: &mut ClusterState, address: &ServerAddress) {
        let callback = match self.callback.get() {
            Some(callback) => Arc::clone(callback),
            // Unreachable: the callback is installed before any member is
            // added.
            None => return,
        };
        match self.factory.create(address, callback) {
            Ok(server) => {
                debug!(address = %address, "adding member to topology");
                state.members.insert(address.clone(), server);
            }
            Err(e) => {
                warn!(
                    address = %address,
                    error = %e,
                    "server factory failed; continuing without this member"
                );
            }
        }
    }

    fn remove_member(&self, state: &mut ClusterState, address: &ServerAddress) {
        if let Some(server) = state.members.remove(address) {
            debug!(address = %address, "removing member from topology");
            // Teardown of the handle belongs to the factory that created it;
            // a notification racing past a still-open handle is dropped by
            // the membership check.
            self.factory.close(&server);
        }
    }

    /// Rebuild the description from the current membership and, if it
    /// changed, publish it and fire change events. Always wakes selection
    /// waiters.
    fn publish(&self, state: &mut ClusterState) {
        let current = Arc::new(ClusterDescription::new(
            self.settings.mode(),
            state.cluster_type,
            state.members.values().map(|s| (*s.description()).clone()),
        ));
        let previous = self
            .published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if *current != *previous {
            *self.published.write().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&current);
            debug!(description = %current, "published new cluster description");
            state.listeners.fire(&ClusterChangedEvent { previous, current });
        }
        self.membership_changed.notify_all();
    }

    fn close(&self) {
        let mut state = self.lock_state();
        if state.closed {
            return;
        }
        state.closed = true;
        info!("closing cluster monitor");

        let members: Vec<Arc<Server>> = state.members.drain().map(|(_, s)| s).collect();
        for server in &members {
            server.close();
            self.factory.close(server);
        }
        self.publish(&mut state);
        state.listeners.clear();
    }
}
