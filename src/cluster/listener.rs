//! Fan-out of cluster description change events.

use crate::description::ClusterDescription;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// A published change of the cluster description.
#[derive(Debug, Clone)]
pub struct ClusterChangedEvent {
    /// The description that was replaced
    pub previous: Arc<ClusterDescription>,
    /// The description now in effect
    pub current: Arc<ClusterDescription>,
}

/// Observer of cluster description changes.
///
/// Listeners are invoked inside the cluster's critical section, in
/// registration order. They must return promptly and must not call mutating
/// cluster methods (`close`, listener management, notification delivery) —
/// the cluster lock is not reentrant. Panics are contained and logged; a
/// panicking listener never corrupts the topology or starves later
/// listeners.
pub trait ClusterListener: Send + Sync {
    /// The cluster description changed.
    fn cluster_changed(&self, event: &ClusterChangedEvent);
}

/// Listener collection keyed by `Arc` identity.
pub(crate) struct ListenerRegistry {
    listeners: Vec<Arc<dyn ClusterListener>>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Append a listener; it will observe events after all earlier
    /// registrations.
    pub(crate) fn add(&mut self, listener: Arc<dyn ClusterListener>) {
        self.listeners.push(listener);
    }

    /// Remove a listener by identity. Idempotent.
    pub(crate) fn remove(&mut self, listener: &Arc<dyn ClusterListener>) {
        self.listeners
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Drop all listeners.
    pub(crate) fn clear(&mut self) {
        self.listeners.clear();
    }

    /// Deliver `event` to every listener in registration order, containing
    /// panics.
    pub(crate) fn fire(&self, event: &ClusterChangedEvent) {
        for listener in &self.listeners {
            if catch_unwind(AssertUnwindSafe(|| listener.cluster_changed(event))).is_err() {
                warn!("cluster listener panicked; continuing with remaining listeners");
            }
        }
    }
}
