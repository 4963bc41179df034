//! Failover dispatch: pick a connection, execute, classify, maybe retry.
//!
//! ```text
//! loop:
//!   strategy.next(snapshot) ── None ──▶ NoConnectionsAvailable (0 attempts)
//!        │                             ConnectionFailed (≥1 attempt)
//!        ▼
//!   transport.execute(conn, req)
//!        ├─ Ok(ok response)          ──▶ return it
//!        ├─ Ok(error / partial)      ──▶ surface immediately, no retry
//!        ├─ Err(node failure)        ──▶ disable conn, notify observer, next
//!        └─ Err(other)               ──▶ surface immediately
//! ```
//! Candidates are tried one at a time; a request is never in flight on two
//! nodes at once.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::connection::Connection;
use crate::error::{DispatchError, TransportError};
use crate::pool::ConnectionPool;
use crate::request::{Request, Response, ResponseStatus};
use crate::transport::{Transport, TransportRegistry};

/// Strategy calls allowed per dispatch, per pooled connection.
pub const ITERATION_FACTOR: usize = 4;

/// Called once per node-level failure, before the next candidate is tried.
pub type FailureObserver = Arc<dyn Fn(&Connection, &TransportError) + Send + Sync>;

/// Dispatch-wide settings.
#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
    /// Overall time budget for one dispatch. No attempt starts after it has
    /// passed, and an in-flight attempt is cut off when it runs out.
    pub deadline: Option<Duration>,
}

/// Drives one logical request across the pool until a node answers.
pub struct Dispatcher {
    pool: Arc<ConnectionPool>,
    transports: TransportRegistry,
    observer: Option<FailureObserver>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(pool: Arc<ConnectionPool>, transports: TransportRegistry) -> Self {
        Self {
            pool,
            transports,
            observer: None,
            config: DispatchConfig::default(),
        }
    }

    pub fn with_observer(mut self, observer: FailureObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn set_observer(&mut self, observer: Option<FailureObserver>) {
        self.observer = observer;
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn transports(&self) -> &TransportRegistry {
        &self.transports
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Send `request` to the first node that completes the exchange.
    pub async fn dispatch(&self, request: &Request) -> Result<Response, DispatchError> {
        // A deadline too far out to represent is no deadline.
        let deadline = self
            .config
            .deadline
            .and_then(|d| Instant::now().checked_add(d));
        let strategy = self.pool.strategy();
        let max_iterations = self.pool.len().max(1) * ITERATION_FACTOR;

        let mut attempts = 0usize;
        let mut tried: Vec<Arc<Connection>> = Vec::new();
        let mut last_error: Option<TransportError> = None;

        for _ in 0..max_iterations {
            let snapshot = self.pool.connections();
            let Some(connection) = strategy.next(&snapshot) else {
                break;
            };

            // Disabled by another dispatch since selection, or already tried
            // in this one.
            if !connection.is_enabled() || tried.iter().any(|c| Arc::ptr_eq(c, &connection)) {
                tracing::trace!(connection = %connection, "skipping candidate");
                continue;
            }

            let remaining = match deadline {
                Some(at) => match at.checked_duration_since(Instant::now()) {
                    Some(left) if !left.is_zero() => Some(left),
                    _ => return Err(DispatchError::DeadlineExceeded { attempts }),
                },
                None => None,
            };

            let transport = self.transports.get(connection.transport()).ok_or_else(|| {
                DispatchError::Transport(TransportError::InvalidRequest(format!(
                    "no transport registered as `{}`",
                    connection.transport()
                )))
            })?;

            attempts += 1;
            let started = Instant::now();
            let result = execute_bounded(transport.as_ref(), &connection, request, remaining).await;
            let elapsed = started.elapsed();

            match result {
                Ok(response) => {
                    tracing::debug!(
                        connection = %connection,
                        attempt = attempts,
                        status = response.status(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "request completed"
                    );
                    return classify(response);
                }
                Err(Bounded::Deadline) => {
                    return Err(DispatchError::DeadlineExceeded { attempts });
                }
                Err(Bounded::Transport(e)) if e.is_node_failure() => {
                    tracing::warn!(
                        connection = %connection,
                        attempt = attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        error = %e,
                        "connection attempt failed"
                    );
                    self.pool.on_fail(&connection);
                    self.notify(&connection, &e);
                    tried.push(connection);
                    last_error = Some(e);
                    if tried.len() >= snapshot.len() {
                        break;
                    }
                }
                Err(Bounded::Transport(e)) => {
                    return Err(DispatchError::Transport(e));
                }
            }
        }

        match last_error {
            None => Err(DispatchError::NoConnectionsAvailable),
            Some(e) => {
                tracing::error!(attempts, error = %e, "all connection attempts failed");
                Err(DispatchError::ConnectionFailed {
                    attempts,
                    source: Box::new(e),
                })
            }
        }
    }

    fn notify(&self, connection: &Connection, error: &TransportError) {
        let Some(observer) = &self.observer else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| observer(connection, error))).is_err() {
            tracing::error!(connection = %connection, "failure observer panicked");
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pool", &self.pool)
            .field("transports", &self.transports)
            .field("observer", &self.observer.is_some())
            .field("config", &self.config)
            .finish()
    }
}

enum Bounded {
    Deadline,
    Transport(TransportError),
}

/// Run one attempt, bounded by the connection timeout and what is left of
/// the dispatch deadline.
async fn execute_bounded(
    transport: &dyn Transport,
    connection: &Connection,
    request: &Request,
    remaining: Option<Duration>,
) -> Result<Response, Bounded> {
    let (limit, by_deadline) = match (connection.timeout(), remaining) {
        (Some(t), Some(r)) if r < t => (Some(r), true),
        (Some(t), _) => (Some(t), false),
        (None, Some(r)) => (Some(r), true),
        (None, None) => (None, false),
    };

    let fut = transport.execute(connection, request);
    match limit {
        None => fut.await.map_err(Bounded::Transport),
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.map_err(Bounded::Transport),
            Err(_) if by_deadline => Err(Bounded::Deadline),
            Err(_) => Err(Bounded::Transport(TransportError::Timeout {
                ms: limit.as_millis() as u64,
            })),
        },
    }
}

/// Map a well-formed response onto success or an application-level error.
fn classify(response: Response) -> Result<Response, DispatchError> {
    match response.outcome() {
        ResponseStatus::Ok => Ok(response),
        ResponseStatus::Error => Err(DispatchError::Response {
            status: response.status(),
            reason: response.error_message().unwrap_or_default(),
            response: Box::new(response),
        }),
        ResponseStatus::PartialFailure => Err(DispatchError::PartialShardFailure {
            failed: response.failed_shards(),
            response: Box::new(response),
        }),
    }
}
