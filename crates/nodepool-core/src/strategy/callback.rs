//! User-supplied selection logic.

use std::sync::Arc;

use super::SelectionStrategy;
use crate::connection::Connection;

type SelectFn = dyn Fn(&[Arc<Connection>]) -> Option<Arc<Connection>> + Send + Sync;

/// Wraps a closure as a strategy.
///
/// The closure sees the full snapshot, including disabled connections. A
/// disabled pick is treated as exhaustion so the closure can't break the
/// "never select a disabled connection" rule.
pub struct CallbackStrategy {
    name: String,
    select: Box<SelectFn>,
}

impl CallbackStrategy {
    pub fn new<F>(select: F) -> Self
    where
        F: Fn(&[Arc<Connection>]) -> Option<Arc<Connection>> + Send + Sync + 'static,
    {
        Self::named("Callback", select)
    }

    pub fn named<F>(name: impl Into<String>, select: F) -> Self
    where
        F: Fn(&[Arc<Connection>]) -> Option<Arc<Connection>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            select: Box::new(select),
        }
    }
}

impl SelectionStrategy for CallbackStrategy {
    fn next(&self, connections: &[Arc<Connection>]) -> Option<Arc<Connection>> {
        (self.select)(connections).filter(|c| c.is_enabled())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for CallbackStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackStrategy")
            .field("name", &self.name)
            .finish()
    }
}
