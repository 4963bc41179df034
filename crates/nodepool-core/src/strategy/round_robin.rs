//! Cursor-based round-robin selection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::SelectionStrategy;
use crate::connection::Connection;

/// Cycles through enabled connections in pool order.
///
/// The cursor holds the index of the next slot to consider. It is not reset
/// when the pool's connection list is replaced; a cursor that falls outside
/// the current list restarts at index 0.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the cycle at `index`.
    pub fn starting_at(index: usize) -> Self {
        Self {
            cursor: AtomicUsize::new(index),
        }
    }

    /// Current cursor position.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Index of the first enabled connection at or after `start`, wrapping.
    fn scan(connections: &[Arc<Connection>], start: usize) -> Option<usize> {
        let len = connections.len();
        (0..len)
            .map(|i| (start + i) % len)
            .find(|&idx| connections[idx].is_enabled())
    }
}

impl SelectionStrategy for RoundRobin {
    fn next(&self, connections: &[Arc<Connection>]) -> Option<Arc<Connection>> {
        if connections.is_empty() {
            return None;
        }
        let mut current = self.cursor.load(Ordering::Acquire);
        loop {
            let start = if current >= connections.len() { 0 } else { current };
            let idx = Self::scan(connections, start)?;
            match self.cursor.compare_exchange_weak(
                current,
                idx + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(Arc::clone(&connections[idx])),
                Err(actual) => current = actual,
            }
        }
    }

    fn name(&self) -> &str {
        "RoundRobin"
    }
}
