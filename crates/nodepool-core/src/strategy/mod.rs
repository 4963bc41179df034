//! Connection selection strategies.
//!
//! A strategy looks at a snapshot of the pool's connections and picks the
//! next one to try:
//! ```text
//! Dispatcher → SelectionStrategy::next(snapshot) → Connection | None (exhausted)
//! ```
//! Strategies never return a disabled connection. An empty or all-disabled
//! snapshot yields `None`.

pub mod callback;
pub mod round_robin;
pub mod simple;

use std::sync::Arc;

use crate::connection::Connection;
use crate::error::ConfigError;

pub use callback::CallbackStrategy;
pub use round_robin::RoundRobin;
pub use simple::Simple;

/// Picks the next connection to try from a pool snapshot.
pub trait SelectionStrategy: Send + Sync + 'static {
    /// Return the next enabled connection, or `None` when exhausted.
    fn next(&self, connections: &[Arc<Connection>]) -> Option<Arc<Connection>>;

    /// Strategy name as used in configuration.
    fn name(&self) -> &str;
}

impl std::fmt::Debug for dyn SelectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionStrategy")
            .field("name", &self.name())
            .finish()
    }
}

/// Built-in strategies selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    /// First enabled connection in pool order.
    #[default]
    Simple,
    /// Cycle through enabled connections.
    RoundRobin,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 2] = [Self::Simple, Self::RoundRobin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "Simple",
            Self::RoundRobin => "RoundRobin",
        }
    }

    /// Build a fresh strategy instance.
    pub fn build(&self) -> Arc<dyn SelectionStrategy> {
        match self {
            Self::Simple => Arc::new(Simple),
            Self::RoundRobin => Arc::new(RoundRobin::new()),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::InvalidStrategy(s.to_string()))
    }
}

/// Build a strategy from its configured name.
pub fn create(name: &str) -> Result<Arc<dyn SelectionStrategy>, ConfigError> {
    Ok(name.parse::<StrategyKind>()?.build())
}
