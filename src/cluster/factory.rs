//! Construction seam for per-address server monitors.

use crate::address::ServerAddress;
use crate::cluster::server::{NotificationCallback, Server};
use crate::error::Result;
use std::sync::Arc;

/// Builds and tears down [`Server`] handles on behalf of a cluster.
///
/// The enclosing driver supplies a factory that attaches heartbeat I/O to
/// each created handle; the factory must wire `callback` so the handle
/// delivers notifications back into the cluster. Creation failures surface
/// as [`ClusterError::Factory`](crate::ClusterError::Factory) and the
/// cluster continues without that member.
pub trait ServerFactory: Send + Sync {
    /// Create the monitor handle for `address`.
    fn create(
        &self,
        address: &ServerAddress,
        callback: NotificationCallback,
    ) -> Result<Arc<Server>>;

    /// Invoked when the cluster removes a member; the factory releases any
    /// resources it attached to the handle.
    fn close(&self, server: &Arc<Server>);
}

/// Factory producing passive handles with no attached I/O.
///
/// Useful when the heartbeat layer pushes notifications from elsewhere and
/// nothing needs tearing down beyond the handle itself.
#[derive(Debug, Default)]
pub struct DefaultServerFactory;

impl ServerFactory for DefaultServerFactory {
    fn create(
        &self,
        address: &ServerAddress,
        callback: NotificationCallback,
    ) -> Result<Arc<Server>> {
        Ok(Arc::new(Server::new(address.clone(), callback)))
    }

    fn close(&self, server: &Arc<Server>) {
        server.close();
    }
}
