//! HTTP transport backed by `reqwest`.
//!
//! Features:
//! - Base URL from the connection's `url` config, or scheme/host/port/path
//! - Per-connection request timeout, connect timeout, proxy and headers
//! - GET requests carrying a body are sent as POST
//! - 4xx/5xx answers are returned as responses, never as transport errors
//! - `reqwest::Client`s cached per (proxy, connect timeout, persistence)

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Url;
use serde_json::Value;

use nodepool_core::connection::Connection;
use nodepool_core::error::TransportError;
use nodepool_core::request::{Method, Request, Response, TransferInfo};
use nodepool_core::transport::{NullTransport, Transport, TransportRegistry};

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub user_agent: String,
    /// Send every request that carries a body as POST.
    pub post_with_request_body: bool,
    /// How long idle keep-alive sockets are kept.
    pub pool_idle_timeout: Option<Duration>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("nodepool/{}", env!("CARGO_PKG_VERSION")),
            post_with_request_body: false,
            pool_idle_timeout: Some(Duration::from_secs(90)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    proxy: Option<String>,
    connect_timeout: Option<Duration>,
    persistent: bool,
}

/// HTTP(S) transport.
///
/// Owns its `reqwest` clients; share one instance (via the registry) to
/// reuse keep-alive connections across dispatches.
pub struct HttpTransport {
    name: String,
    config: HttpTransportConfig,
    clients: Mutex<HashMap<ClientKey, reqwest::Client>>,
}

impl HttpTransport {
    pub fn new(name: impl Into<String>, config: HttpTransportConfig) -> Self {
        Self {
            name: name.into(),
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Plain HTTP transport registered as `Http`.
    pub fn http() -> Self {
        Self::new("Http", HttpTransportConfig::default())
    }

    /// Transport registered as `Https`. Connections using it default to
    /// the `https` scheme.
    pub fn https() -> Self {
        Self::new("Https", HttpTransportConfig::default())
    }

    /// Number of distinct `reqwest` clients built so far.
    pub fn cached_clients(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn client_for(&self, connection: &Connection) -> Result<reqwest::Client, TransportError> {
        let key = ClientKey {
            proxy: connection.proxy().map(str::to_owned),
            connect_timeout: connection.connect_timeout(),
            persistent: connection.is_persistent(),
        };

        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(self.config.user_agent.as_str())
            .pool_idle_timeout(self.config.pool_idle_timeout);
        if let Some(timeout) = key.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if !key.persistent {
            builder = builder.pool_max_idle_per_host(0);
        }
        builder = match &key.proxy {
            Some(proxy) => builder.proxy(
                reqwest::Proxy::all(proxy)
                    .map_err(|e| TransportError::InvalidRequest(format!("invalid proxy: {e}")))?,
            ),
            // Only an explicitly configured proxy is used.
            None => builder.no_proxy(),
        };
        let client = builder
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;

        tracing::debug!(transport = %self.name, proxy = ?key.proxy, "built HTTP client");
        clients.insert(key, client.clone());
        Ok(client)
    }

    fn forces_post(&self, connection: &Connection) -> bool {
        self.config.post_with_request_body
            || connection
                .transport_params()
                .get("postWithRequestBody")
                .and_then(Value::as_bool)
                .unwrap_or(false)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        connection: &Connection,
        request: &Request,
    ) -> Result<Response, TransportError> {
        let client = self.client_for(connection)?;
        let url = request_url(connection, request)?;
        let method = effective_method(request, self.forces_post(connection));

        let mut builder = client.request(reqwest_method(method), url.clone());
        if let Some(timeout) = connection.timeout() {
            builder = builder.timeout(timeout);
        }
        for (name, value) in headers(connection)? {
            builder = builder.header(name, value);
        }
        if request.has_data() {
            if let Some(data) = &request.data {
                let body = data
                    .to_body()
                    .map_err(|e| TransportError::InvalidRequest(format!("unencodable body: {e}")))?;
                builder = builder
                    .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                    .body(body);
            }
        }

        let timeout_ms = connection.timeout().map_or(0, |t| t.as_millis() as u64);
        let started = Instant::now();
        let resp = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout_ms))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, timeout_ms))?;
        let elapsed = started.elapsed();

        tracing::trace!(
            %url,
            method = %method,
            status,
            elapsed_ms = elapsed.as_millis() as u64,
            "HTTP exchange complete"
        );

        let mut response = Response::new(body, status);
        response.set_query_time(elapsed);
        response.set_transfer_info(TransferInfo {
            method: Some(method),
            http_code: status,
            url: Some(url.to_string()),
        });
        Ok(response)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("cached_clients", &self.cached_clients())
            .finish()
    }
}

/// Registry with the `Null`, `Http` and `Https` transports.
pub fn default_registry() -> TransportRegistry {
    let mut registry = TransportRegistry::new();
    registry
        .register(std::sync::Arc::new(NullTransport))
        .register(std::sync::Arc::new(HttpTransport::http()))
        .register(std::sync::Arc::new(HttpTransport::https()));
    registry
}

/// `/` + request path, leading slashes collapsed. Empty paths stay empty.
pub fn action_path(request: &Request) -> String {
    let path = request.path.trim_start_matches('/');
    if path.is_empty() {
        String::new()
    } else {
        format!("/{path}")
    }
}

/// Full request URL: base URL + action path + query string.
pub fn request_url(connection: &Connection, request: &Request) -> Result<Url, TransportError> {
    let raw = format!("{}{}", connection.base_url(), action_path(request));
    let mut url = Url::parse(&raw)
        .map_err(|e| TransportError::InvalidRequest(format!("invalid URL {raw}: {e}")))?;
    if !request.query.is_empty() {
        url.query_pairs_mut().extend_pairs(request.query.iter());
    }
    Ok(url)
}

/// GET requests with a body go out as POST, as does any request with a
/// body when `force_post` is set.
pub fn effective_method(request: &Request, force_post: bool) -> Method {
    if request.has_data() && (request.method == Method::Get || force_post) {
        Method::Post
    } else {
        request.method
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
    }
}

/// Headers from the connection's `headers` config map.
fn headers(connection: &Connection) -> Result<Vec<(HeaderName, HeaderValue)>, TransportError> {
    let Some(Value::Object(map)) = connection.config_map().get("headers") else {
        return Ok(Vec::new());
    };
    map.iter()
        .map(|(name, value)| {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidRequest(format!("header {name}: {e}")))?;
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let value = HeaderValue::from_str(&text)
                .map_err(|e| TransportError::InvalidRequest(format!("header {name}: {e}")))?;
            Ok((name, value))
        })
        .collect()
}

fn map_reqwest_error(e: reqwest::Error, timeout_ms: u64) -> TransportError {
    if e.is_builder() {
        TransportError::InvalidRequest(e.to_string())
    } else if e.is_timeout() {
        TransportError::Timeout { ms: timeout_ms }
    } else if e.is_connect() {
        if mentions_tls(&e) {
            TransportError::Tls(error_chain(&e))
        } else {
            TransportError::Connect(error_chain(&e))
        }
    } else {
        TransportError::Http(error_chain(&e))
    }
}

fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        msg.push_str(": ");
        msg.push_str(&inner.to_string());
        source = inner.source();
    }
    msg
}

fn mentions_tls(e: &reqwest::Error) -> bool {
    let chain = error_chain(e).to_ascii_lowercase();
    chain.contains("certificate") || chain.contains("tls") || chain.contains("handshake")
}
