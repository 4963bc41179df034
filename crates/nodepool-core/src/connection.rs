//! A single backend endpoint plus its runtime enabled flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Default host when none is configured.
pub const DEFAULT_HOST: &str = "localhost";
/// Default port when none is configured.
pub const DEFAULT_PORT: u16 = 9200;
/// Default transport name.
pub const DEFAULT_TRANSPORT: &str = "Http";
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Descriptor of one backend endpoint.
///
/// Endpoint fields are fixed once the connection is shared; only the
/// enabled flag changes afterwards. To point at a different endpoint,
/// replace the connection in the pool.
#[derive(Debug)]
pub struct Connection {
    host: String,
    port: u16,
    path: Option<String>,
    scheme: Option<String>,
    transport: String,
    transport_params: Map<String, Value>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    persistent: bool,
    config: Map<String, Value>,
    enabled: AtomicBool,
}

impl Connection {
    /// Create a connection to `host:port` with default settings.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, ConfigError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(ConfigError::field("host", "must not be empty"));
        }
        if port == 0 {
            return Err(ConfigError::field("port", "must be a positive integer"));
        }
        Ok(Self {
            host,
            port,
            path: None,
            scheme: None,
            transport: DEFAULT_TRANSPORT.to_string(),
            transport_params: Map::new(),
            timeout: Some(DEFAULT_TIMEOUT),
            connect_timeout: None,
            persistent: true,
            config: Map::new(),
            enabled: AtomicBool::new(true),
        })
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = (!path.is_empty()).then_some(path);
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    pub fn with_transport(mut self, transport: impl Into<String>) -> Self {
        self.transport = transport.into();
        self
    }

    pub fn with_transport_params(mut self, params: Map<String, Value>) -> Self {
        self.transport_params = params;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Set a transport-specific option (e.g. `url`, `headers`, `proxy`).
    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn with_config_map(mut self, config: Map<String, Value>) -> Self {
        self.config.extend(config);
        self
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        self.set_enabled(enabled);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// URL scheme: explicit if set, otherwise derived from the transport name.
    pub fn scheme(&self) -> &str {
        match &self.scheme {
            Some(s) => s,
            None if self.transport.eq_ignore_ascii_case("https") => "https",
            None => "http",
        }
    }

    /// Name of the transport that executes requests for this connection.
    pub fn transport(&self) -> &str {
        &self.transport
    }

    /// Parameters given alongside the transport name.
    pub fn transport_params(&self) -> &Map<String, Value> {
        &self.transport_params
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// The full transport-specific config map.
    pub fn config_map(&self) -> &Map<String, Value> {
        &self.config
    }

    pub fn has_config(&self, key: &str) -> bool {
        self.config.contains_key(key)
    }

    /// Look up a transport-specific option. Missing keys are an error.
    pub fn config(&self, key: &str) -> Result<&Value, ConfigError> {
        self.config
            .get(key)
            .ok_or_else(|| ConfigError::field(key, "config key not found"))
    }

    /// Proxy URL from the `proxy` config key, if any.
    pub fn proxy(&self) -> Option<&str> {
        self.config.get("proxy").and_then(Value::as_str)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Base URL for requests: the `url` config key wins over
    /// scheme/host/port/path. Trailing slashes are trimmed.
    pub fn base_url(&self) -> String {
        if let Some(url) = self.config.get("url").and_then(Value::as_str) {
            if !url.is_empty() {
                return url.trim_end_matches('/').to_string();
            }
        }
        let path = self.path.as_deref().unwrap_or("").trim_start_matches('/');
        format!("{}://{}:{}/{}", self.scheme(), self.host, self.port, path)
            .trim_end_matches('/')
            .to_string()
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            path: None,
            scheme: None,
            transport: DEFAULT_TRANSPORT.to_string(),
            transport_params: Map::new(),
            timeout: Some(DEFAULT_TIMEOUT),
            connect_timeout: None,
            persistent: true,
            config: Map::new(),
            enabled: AtomicBool::new(true),
        }
    }
}

impl std::fmt::Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base_url())
    }
}
