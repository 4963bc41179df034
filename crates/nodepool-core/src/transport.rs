//! The `Transport` trait, which executes a request against one connection.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::Connection;
use crate::error::{ConfigError, TransportError};
use crate::request::{Request, Response, TransferInfo};

/// Health of a connection or a whole pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Every connection is enabled.
    Healthy,
    /// Some connections are disabled.
    Degraded,
    /// No connection is enabled.
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Executes requests against a single given connection.
///
/// # Failure contract
/// Return `Err` only when the exchange with the node could not be
/// completed. A node that answers with an error status or error body is a
/// successful exchange: return `Ok(response)` and let the dispatcher
/// classify it.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; one instance serves concurrent
/// dispatches and is stored as `Arc<dyn Transport>`.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Execute `request` against `connection`.
    async fn execute(
        &self,
        connection: &Connection,
        request: &Request,
    ) -> Result<Response, TransportError>;

    /// Transport name, as referenced by `Connection::transport`.
    fn name(&self) -> &str;
}

/// Transport that never touches the network and always answers with an
/// empty successful response.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

#[async_trait]
impl Transport for NullTransport {
    async fn execute(
        &self,
        connection: &Connection,
        request: &Request,
    ) -> Result<Response, TransportError> {
        let mut response = Response::new("{}", 200);
        response.set_query_time(std::time::Duration::ZERO);
        response.set_transfer_info(TransferInfo {
            method: Some(request.method),
            http_code: 200,
            url: Some(format!("{}{}", connection.base_url(), request.path)),
        });
        Ok(response)
    }

    fn name(&self) -> &str {
        "Null"
    }
}

/// Lookup table from transport name to implementation.
///
/// Names match case-insensitively.
#[derive(Clone, Default)]
pub struct TransportRegistry {
    transports: HashMap<String, Arc<dyn Transport>>,
}

impl TransportRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with [`NullTransport`].
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(NullTransport));
        registry
    }

    /// Register `transport` under its own name.
    pub fn register(&mut self, transport: Arc<dyn Transport>) -> &mut Self {
        let name = transport.name().to_ascii_lowercase();
        self.transports.insert(name, transport);
        self
    }

    /// Register `transport` under an additional name.
    pub fn register_as(&mut self, name: &str, transport: Arc<dyn Transport>) -> &mut Self {
        self.transports.insert(name.to_ascii_lowercase(), transport);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Transport>> {
        self.transports.get(&name.to_ascii_lowercase()).cloned()
    }

    /// Like [`get`](Self::get), but a missing name is a config error.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Transport>, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::InvalidTransport(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transports.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .transports
            .values()
            .map(|t| t.name().to_string())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

impl std::fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("transports", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Method;

    #[tokio::test]
    async fn null_transport_answers_ok() {
        let conn = Connection::default();
        let req = Request::new("/_cluster/health", Method::Get);
        let resp = NullTransport.execute(&conn, &req).await.unwrap();
        assert!(resp.is_ok());
        assert_eq!(
            resp.transfer_info().url.as_deref(),
            Some("http://localhost:9200/_cluster/health")
        );
    }

    #[test]
    fn registry_lookup_is_case_insensitive() {
        let registry = TransportRegistry::with_defaults();
        assert!(registry.get("null").is_some());
        assert!(registry.get("NULL").is_some());
        assert!(matches!(
            registry.resolve("Thrift"),
            Err(ConfigError::InvalidTransport(name)) if name == "Thrift"
        ));
        assert_eq!(registry.names(), vec!["Null".to_string()]);
    }
}
