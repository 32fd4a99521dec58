//! Per-address monitor handle.

use crate::address::ServerAddress;
use crate::description::ServerDescription;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::warn;

/// Callback a cluster installs on its servers; invoked synchronously with
/// every accepted notification.
///
/// The closure holds only a weak reference back to the cluster, so a server
/// handle that outlives its cluster delivers into nothing.
pub type NotificationCallback = Arc<dyn Fn(ServerDescription) + Send + Sync>;

/// Handle for one monitored server.
///
/// The handle is deliberately passive: heartbeat I/O and cadence live in the
/// enclosing driver, which pushes results in through
/// [`send_notification`](Server::send_notification). The handle holds the
/// latest [`ServerDescription`] and forwards accepted notifications to the
/// owning cluster.
///
/// Notifications for one server must be submitted serially; the handle
/// applies them in submission order but does not itself order concurrent
/// senders.
pub struct Server {
    address: ServerAddress,
    description: RwLock<Arc<ServerDescription>>,
    closed: AtomicBool,
    callback: NotificationCallback,
}

impl Server {
    /// Create a handle for `address` that delivers notifications through
    /// `callback`. The initial description is Connecting/Unknown.
    pub fn new(address: ServerAddress, callback: NotificationCallback) -> Self {
        let initial = Arc::new(ServerDescription::connecting(address.clone()));
        Self {
            address,
            description: RwLock::new(initial),
            closed: AtomicBool::new(false),
            callback,
        }
    }

    /// The address this handle monitors
    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    /// The latest stored description. Never blocks on the cluster lock.
    pub fn description(&self) -> Arc<ServerDescription> {
        self.description
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the stored description with `description` and deliver it to
    /// the owning cluster.
    ///
    /// No-op once the handle is closed. A description carrying a different
    /// address than this handle's is dropped.
    pub fn send_notification(&self, description: ServerDescription) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if description.address != self.address {
            warn!(
                server = %self.address,
                reported = %description.address,
                "dropping notification whose address does not match its server"
            );
            return;
        }

        self.replace_description(description.clone());
        (self.callback)(description);
    }

    /// Stop accepting notifications. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Whether [`close`](Server::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Overwrite the stored description without notifying the cluster.
    /// Used when the cluster itself rewrites a member's state, e.g. demoting
    /// a stale primary.
    pub(crate) fn replace_description(&self, description: ServerDescription) {
        *self
            .description
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Arc::new(description);
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("address", &self.address)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .field("description", &self.description())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::ServerType;
    use std::sync::Mutex;

    fn addr(s: &str) -> ServerAddress {
        s.parse().unwrap()
    }

    fn recording_callback() -> (NotificationCallback, Arc<Mutex<Vec<ServerDescription>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: NotificationCallback = Arc::new(move |desc| {
            sink.lock().unwrap().push(desc);
        });
        (callback, seen)
    }

    #[test]
    fn test_initial_description_is_connecting() {
        let (callback, _) = recording_callback();
        let server = Server::new(addr("h1:27017"), callback);
        let desc = server.description();
        assert!(!desc.ok);
        assert_eq!(desc.address, addr("h1:27017"));
    }

    #[test]
    fn test_notification_replaces_description_and_invokes_callback() {
        let (callback, seen) = recording_callback();
        let server = Server::new(addr("h1:27017"), callback);

        let desc = ServerDescription::builder(addr("h1:27017"))
            .server_type(ServerType::StandAlone)
            .build();
        server.send_notification(desc.clone());

        assert_eq!(*server.description(), desc);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_closed_server_ignores_notifications() {
        let (callback, seen) = recording_callback();
        let server = Server::new(addr("h1:27017"), callback);
        server.close();
        server.close();

        server.send_notification(
            ServerDescription::builder(addr("h1:27017"))
                .server_type(ServerType::StandAlone)
                .build(),
        );

        assert!(!server.description().ok);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_mismatched_address_is_dropped() {
        let (callback, seen) = recording_callback();
        let server = Server::new(addr("h1:27017"), callback);

        server.send_notification(
            ServerDescription::builder(addr("h2:27017"))
                .server_type(ServerType::StandAlone)
                .build(),
        );

        assert!(!server.description().ok);
        assert!(seen.lock().unwrap().is_empty());
    }
}
