//! nodepool-core: connection pool, selection strategies and failover
//! dispatch for clients of replicated clusters.
//!
//! # Overview
//!
//! A client talks to several equivalent nodes. Each request goes to one
//! node picked by a strategy; if that node can't be reached, the request is
//! retried on another. The core crate defines:
//!
//! - [`Connection`]: one backend endpoint and its enabled flag
//! - [`SelectionStrategy`]: picks the next connection ([`strategy`] module)
//! - [`ConnectionPool`]: the connection list plus the active strategy
//! - [`Transport`]: the async trait concrete transports implement
//! - [`Dispatcher`]: the failover loop
//! - [`Client`]: pool + dispatcher built from a [`ClientConfig`]
//! - [`DispatchError`] / [`TransportError`] / [`ConfigError`]: error types

pub mod client;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod pool;
pub mod request;
pub mod strategy;
pub mod transport;

pub use client::Client;
pub use config::{ClientConfig, ConnectionConfig, TransportSpec};
pub use connection::Connection;
pub use dispatch::{DispatchConfig, Dispatcher, FailureObserver};
pub use error::{ConfigError, DispatchError, TransportError};
pub use pool::ConnectionPool;
pub use request::{Method, Request, RequestData, Response, ResponseStatus, TransferInfo};
pub use strategy::{CallbackStrategy, RoundRobin, SelectionStrategy, Simple, StrategyKind};
pub use transport::{HealthStatus, NullTransport, Transport, TransportRegistry};
