//! Test doubles for exercising a cluster without any I/O.
//!
//! [`TestServerFactory`] stands in for the heartbeat layer: it creates
//! passive server handles, records every creation and teardown, and lets a
//! test push [`ServerDescription`]s into the cluster as if heartbeats had
//! produced them. It backs this crate's own suite and is exported so
//! enclosing drivers can reuse it.

use crate::address::ServerAddress;
use crate::cluster::{NotificationCallback, Server, ServerFactory};
use crate::description::ServerDescription;
use crate::error::{ClusterError, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Server factory that records its activity and performs no I/O.
pub struct TestServerFactory {
    created: Mutex<Vec<Arc<Server>>>,
    closed: Mutex<Vec<ServerAddress>>,
    failing: Mutex<HashSet<ServerAddress>>,
    keep_open_on_close: AtomicBool,
}

impl TestServerFactory {
    pub fn new() -> Self {
        Self {
            created: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            keep_open_on_close: AtomicBool::new(false),
        }
    }

    /// Make creation fail for `address`, simulating a factory error.
    pub fn fail_address(&self, address: ServerAddress) {
        self.failing.lock().unwrap().insert(address);
    }

    /// Leave handles open when the cluster removes their member, so a test
    /// can deliver a late notification from an already-removed server.
    pub fn keep_servers_open(&self) {
        self.keep_open_on_close.store(true, Ordering::SeqCst);
    }

    /// The most recently created handle for `address`, including handles
    /// whose member has since been removed.
    pub fn server(&self, address: &ServerAddress) -> Option<Arc<Server>> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.address() == address)
            .cloned()
    }

    /// How many handles have been created over the factory's lifetime.
    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    /// Addresses whose handles the cluster has asked to tear down, in order.
    pub fn closed_addresses(&self) -> Vec<ServerAddress> {
        self.closed.lock().unwrap().clone()
    }

    /// Deliver `description` through the handle owning its address, as a
    /// heartbeat would.
    ///
    /// # Panics
    ///
    /// Panics if no handle was ever created for the address.
    pub fn notify(&self, description: ServerDescription) {
        let server = self
            .server(&description.address)
            .unwrap_or_else(|| panic!("no server was created for {}", description.address));
        server.send_notification(description);
    }
}

impl Default for TestServerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerFactory for TestServerFactory {
    fn create(
        &self,
        address: &ServerAddress,
        callback: NotificationCallback,
    ) -> Result<Arc<Server>> {
        if self.failing.lock().unwrap().contains(address) {
            return Err(ClusterError::Factory(format!(
                "configured to fail for {}",
                address
            )));
        }
        let server = Arc::new(Server::new(address.clone(), callback));
        self.created.lock().unwrap().push(Arc::clone(&server));
        Ok(server)
    }

    fn close(&self, server: &Arc<Server>) {
        self.closed.lock().unwrap().push(server.address().clone());
        if !self.keep_open_on_close.load(Ordering::SeqCst) {
            server.close();
        }
    }
}
