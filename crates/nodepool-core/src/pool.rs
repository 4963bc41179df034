//! Ordered connection set plus the active selection strategy.

use std::sync::{Arc, PoisonError, RwLock};

use crate::connection::Connection;
use crate::strategy::{SelectionStrategy, Simple};
use crate::transport::HealthStatus;

/// Owns the connections and the strategy used to pick among them.
///
/// Readers always get a snapshot: [`connections`](Self::connections)
/// clones an `Arc` to the current list, so a concurrent
/// [`set_connections`](Self::set_connections) never exposes a half-updated
/// sequence and no lock is held while a request is in flight.
///
/// Replacing the list does not reset a round-robin cursor.
pub struct ConnectionPool {
    connections: RwLock<Arc<Vec<Arc<Connection>>>>,
    strategy: RwLock<Arc<dyn SelectionStrategy>>,
}

impl ConnectionPool {
    /// Build a pool from a list of connections.
    pub fn new(connections: Vec<Arc<Connection>>, strategy: Arc<dyn SelectionStrategy>) -> Self {
        Self {
            connections: RwLock::new(Arc::new(connections)),
            strategy: RwLock::new(strategy),
        }
    }

    /// Snapshot of the current connection list.
    pub fn connections(&self) -> Arc<Vec<Arc<Connection>>> {
        let guard = self.connections.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Replace the whole connection list.
    pub fn set_connections(&self, connections: Vec<Arc<Connection>>) {
        let mut guard = self.connections.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(connections);
    }

    /// Append a connection.
    pub fn add_connection(&self, connection: Arc<Connection>) {
        let mut guard = self.connections.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(connection);
        *guard = Arc::new(next);
    }

    pub fn strategy(&self) -> Arc<dyn SelectionStrategy> {
        let guard = self.strategy.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Swap the strategy; takes effect on the next selection.
    pub fn set_strategy(&self, strategy: Arc<dyn SelectionStrategy>) {
        let mut guard = self.strategy.write().unwrap_or_else(PoisonError::into_inner);
        *guard = strategy;
    }

    /// Ask the active strategy for the next connection.
    pub fn next_connection(&self) -> Option<Arc<Connection>> {
        let snapshot = self.connections();
        self.strategy().next(&snapshot)
    }

    /// Number of connections in the pool.
    pub fn len(&self) -> usize {
        self.connections().len()
    }

    /// Returns `true` if the pool has no connections.
    pub fn is_empty(&self) -> bool {
        self.connections().is_empty()
    }

    pub fn enabled_count(&self) -> usize {
        self.connections().iter().filter(|c| c.is_enabled()).count()
    }

    /// Returns `true` if at least one connection is enabled.
    pub fn has_connection(&self) -> bool {
        self.enabled_count() > 0
    }

    /// Re-enable every connection.
    pub fn enable_all(&self) {
        for conn in self.connections().iter() {
            conn.set_enabled(true);
        }
    }

    /// Mark `connection` as failed: it is disabled until re-enabled.
    pub fn on_fail(&self, connection: &Connection) {
        if connection.is_enabled() {
            connection.set_enabled(false);
            tracing::warn!(connection = %connection, "connection disabled");
        }
    }

    /// Returns the base URL and enabled flag of each connection.
    pub fn health_summary(&self) -> Vec<(String, bool)> {
        self.connections()
            .iter()
            .map(|c| (c.base_url(), c.is_enabled()))
            .collect()
    }

    pub fn health(&self) -> HealthStatus {
        let snapshot = self.connections();
        let enabled = snapshot.iter().filter(|c| c.is_enabled()).count();
        match enabled {
            0 => HealthStatus::Unhealthy,
            n if n == snapshot.len() => HealthStatus::Healthy,
            _ => HealthStatus::Degraded,
        }
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new(Vec::new(), Arc::new(Simple))
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("connections", &self.len())
            .field("enabled", &self.enabled_count())
            .field("strategy", &self.strategy().name())
            .finish()
    }
}
