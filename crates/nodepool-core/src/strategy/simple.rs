//! First-available selection.

use std::sync::Arc;

use super::SelectionStrategy;
use crate::connection::Connection;

/// Always returns the first enabled connection in pool order. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct Simple;

impl SelectionStrategy for Simple {
    fn next(&self, connections: &[Arc<Connection>]) -> Option<Arc<Connection>> {
        connections.iter().find(|c| c.is_enabled()).cloned()
    }

    fn name(&self) -> &str {
        "Simple"
    }
}
