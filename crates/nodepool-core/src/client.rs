//! High-level client: a configured pool plus a dispatcher.

use std::sync::Arc;

use serde_json::Value;

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::dispatch::{DispatchConfig, Dispatcher, FailureObserver};
use crate::error::{ConfigError, DispatchError, TransportError};
use crate::pool::ConnectionPool;
use crate::request::{Method, Request, Response};
use crate::strategy::SelectionStrategy;
use crate::transport::{HealthStatus, TransportRegistry};

/// Entry point for sending requests to a cluster of equivalent nodes.
///
/// # Example
/// ```rust,no_run
/// use nodepool_core::{Client, ClientConfig, Method, TransportRegistry};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig::from_json_str(r#"{ "roundRobin": true, "transport": "Null" }"#)?;
/// let client = Client::new(config, TransportRegistry::with_defaults())?;
/// let response = client.request("/_cluster/health", Method::Get, None, &[]).await?;
/// println!("{}", response.body());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    dispatcher: Dispatcher,
}

impl Client {
    /// Build a client. Strategy names and transport names are validated
    /// here, not at dispatch time.
    pub fn new(config: ClientConfig, transports: TransportRegistry) -> Result<Self, ConfigError> {
        let strategy = config.strategy_kind()?.build();
        let connections = config.build_connections()?;
        validate_transports(&connections, &transports)?;

        let pool = ConnectionPool::new(connections.into_iter().map(Arc::new).collect(), strategy);
        let dispatcher =
            Dispatcher::new(Arc::new(pool), transports).with_config(config.dispatch_config());
        tracing::debug!(
            connections = dispatcher.pool().len(),
            strategy = dispatcher.pool().strategy().name(),
            "client ready"
        );
        Ok(Self { config, dispatcher })
    }

    /// Register a callback invoked once per failed connection attempt.
    pub fn with_failure_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&Connection, &TransportError) + Send + Sync + 'static,
    {
        self.dispatcher.set_observer(Some(Arc::new(observer) as FailureObserver));
        self
    }

    pub fn with_dispatch_config(mut self, config: DispatchConfig) -> Self {
        self.dispatcher = self.dispatcher.with_config(config);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        self.dispatcher.pool()
    }

    /// Build a request from its parts and dispatch it.
    pub async fn request(
        &self,
        path: &str,
        method: Method,
        data: Option<Value>,
        query: &[(&str, &str)],
    ) -> Result<Response, DispatchError> {
        let mut request = Request::new(path, method);
        if let Some(data) = data {
            request = request.with_json(data);
        }
        for (key, value) in query {
            request = request.with_query(*key, *value);
        }
        self.send(&request).await
    }

    /// Dispatch a prepared request.
    pub async fn send(&self, request: &Request) -> Result<Response, DispatchError> {
        self.dispatcher.dispatch(request).await
    }

    pub fn connections(&self) -> Arc<Vec<Arc<Connection>>> {
        self.pool().connections()
    }

    /// Replace all connections.
    pub fn set_connections(&self, connections: Vec<Connection>) -> Result<(), ConfigError> {
        validate_transports(&connections, self.dispatcher.transports())?;
        self.pool()
            .set_connections(connections.into_iter().map(Arc::new).collect());
        Ok(())
    }

    pub fn add_connection(&self, connection: Connection) -> Result<(), ConfigError> {
        validate_transports(std::slice::from_ref(&connection), self.dispatcher.transports())?;
        self.pool().add_connection(Arc::new(connection));
        Ok(())
    }

    /// Returns `true` if at least one connection is enabled.
    pub fn has_connection(&self) -> bool {
        self.pool().has_connection()
    }

    pub fn connection_strategy(&self) -> Arc<dyn SelectionStrategy> {
        self.pool().strategy()
    }

    pub fn set_connection_strategy(&self, strategy: Arc<dyn SelectionStrategy>) {
        self.pool().set_strategy(strategy);
    }

    pub fn health(&self) -> HealthStatus {
        self.pool().health()
    }
}

fn validate_transports(
    connections: &[Connection],
    transports: &TransportRegistry,
) -> Result<(), ConfigError> {
    connections
        .iter()
        .try_for_each(|c| transports.resolve(c.transport()).map(|_| ()))
}
