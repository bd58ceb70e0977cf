//! Mutex-guarded table of live connections.
//!
//! Each listener owns one registry. Connections are inserted when
//! accepted and remove themselves when stopped, so the table holds
//! exactly the running connections. The per-IP count backs the
//! listener's admission check.

use crate::server::connection::{Connection, ConnectionId};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Live-connection table for one listener
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Arc<Connection>>> {
        // a panicked holder leaves the map intact, so keep going
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection under its id
    pub fn insert(&self, conn: Arc<Connection>) {
        self.lock().insert(conn.id(), conn);
    }

    /// Remove a connection; returns it if it was present
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.lock().remove(&id)
    }

    /// Whether the id is currently registered
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Number of live connections from one address
    pub fn count_for_ip(&self, ip: IpAddr) -> usize {
        self.lock()
            .values()
            .filter(|conn| conn.peer().ip() == ip)
            .count()
    }

    /// Clones of every live connection, for shutdown sweeps
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
