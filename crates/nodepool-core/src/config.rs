//! Client configuration: the mapping a pool is built from.
//!
//! ```json
//! {
//!   "host": "localhost",
//!   "port": 9200,
//!   "transport": "Http",
//!   "timeout": 30,
//!   "connectTimeout": 2,
//!   "connectionStrategy": "RoundRobin",
//!   "connections": [
//!     { "host": "es1" },
//!     { "host": "es2", "port": 9201, "headers": { "X-Node": "2" } }
//!   ]
//! }
//! ```
//! Per-node entries in `connections` inherit every field they leave unset
//! from the top level.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::connection::{Connection, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT, DEFAULT_TRANSPORT};
use crate::dispatch::DispatchConfig;
use crate::error::ConfigError;
use crate::strategy::StrategyKind;

/// Transport selector: a bare name, or a name with parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransportSpec {
    Name(String),
    Detailed {
        #[serde(rename = "type")]
        kind: String,
        #[serde(flatten)]
        params: Map<String, Value>,
    },
}

impl TransportSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Detailed { kind, .. } => kind,
        }
    }

    pub fn params(&self) -> Map<String, Value> {
        match self {
            Self::Name(_) => Map::new(),
            Self::Detailed { params, .. } => params.clone(),
        }
    }
}

/// Settings for one connection. Every field is optional so a per-node entry
/// can override just what differs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(
        default,
        deserialize_with = "port_from_number_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Full base URL; takes precedence over host/port/path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportSpec>,
    /// Request timeout in seconds; `0` disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Connect timeout in seconds; `0` disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Transport-specific options, passed through verbatim.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
    /// Unrecognised keys; kept for the transport.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConnectionConfig {
    /// Fill every unset field of `self` from `defaults`. Config maps are
    /// merged key by key, `self` winning.
    pub fn inherit(&self, defaults: &ConnectionConfig) -> ConnectionConfig {
        let mut config = defaults.config.clone();
        config.extend(self.config.clone());
        let mut extra = defaults.extra.clone();
        extra.extend(self.extra.clone());

        ConnectionConfig {
            host: self.host.clone().or_else(|| defaults.host.clone()),
            port: self.port.or(defaults.port),
            path: self.path.clone().or_else(|| defaults.path.clone()),
            url: self.url.clone().or_else(|| defaults.url.clone()),
            scheme: self.scheme.clone().or_else(|| defaults.scheme.clone()),
            transport: self.transport.clone().or_else(|| defaults.transport.clone()),
            timeout: self.timeout.or(defaults.timeout),
            connect_timeout: self.connect_timeout.or(defaults.connect_timeout),
            persistent: self.persistent.or(defaults.persistent),
            enabled: self.enabled.or(defaults.enabled),
            headers: self.headers.clone().or_else(|| defaults.headers.clone()),
            proxy: self.proxy.clone().or_else(|| defaults.proxy.clone()),
            config,
            extra,
        }
    }

    /// Build a connection, applying process-wide defaults for unset fields.
    pub fn build(&self) -> Result<Connection, ConfigError> {
        let host = self.host.as_deref().unwrap_or(DEFAULT_HOST);
        let port = self.port.unwrap_or(DEFAULT_PORT);

        let (transport, params) = match &self.transport {
            Some(spec) => {
                if spec.name().trim().is_empty() {
                    return Err(ConfigError::field("transport", "must not be empty"));
                }
                (spec.name().to_string(), spec.params())
            }
            None => (DEFAULT_TRANSPORT.to_string(), Map::new()),
        };

        let mut config = self.extra.clone();
        config.extend(self.config.clone());
        if let Some(url) = &self.url {
            config.insert("url".into(), Value::String(url.clone()));
        }
        if let Some(headers) = &self.headers {
            config.insert("headers".into(), Value::Object(headers.clone()));
        }
        if let Some(proxy) = &self.proxy {
            config.insert("proxy".into(), Value::String(proxy.clone()));
        }

        let mut connection = Connection::new(host, port)?
            .with_transport(transport)
            .with_transport_params(params)
            .with_timeout(seconds(self.timeout).unwrap_or(Some(DEFAULT_TIMEOUT)))
            .with_connect_timeout(seconds(self.connect_timeout).flatten())
            .with_persistent(self.persistent.unwrap_or(true))
            .with_config_map(config)
            .with_enabled(self.enabled.unwrap_or(true));
        if let Some(path) = &self.path {
            connection = connection.with_path(path.clone());
        }
        if let Some(scheme) = &self.scheme {
            connection = connection.with_scheme(scheme.clone());
        }
        Ok(connection)
    }
}

/// `Some(0)` means "no limit".
fn seconds(value: Option<u64>) -> Option<Option<Duration>> {
    value.map(|s| (s > 0).then(|| Duration::from_secs(s)))
}

fn port_from_number_or_string<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|p| u16::try_from(p).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid port: {n}"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u16>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid port: {s}"))),
        Some(other) => Err(D::Error::custom(format!("invalid port: {other}"))),
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Per-node overrides. Empty means a single node built from the
    /// top-level fields.
    #[serde(default, alias = "servers", skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<ConnectionConfig>,
    /// Strategy name; defaults to `Simple`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_strategy: Option<String>,
    /// Legacy switch: `true` selects `RoundRobin` when no
    /// `connectionStrategy` is given.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub round_robin: bool,
    /// Overall dispatch deadline in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<u64>,
    /// Top-level connection fields, inherited by every node.
    #[serde(flatten)]
    pub defaults: ConnectionConfig,
}

impl ClientConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Load from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Config with one node per URL.
    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            connections: urls
                .into_iter()
                .map(|u| ConnectionConfig {
                    url: Some(u.into()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    /// Resolve the strategy: explicit name, else the legacy flag, else Simple.
    pub fn strategy_kind(&self) -> Result<StrategyKind, ConfigError> {
        match &self.connection_strategy {
            Some(name) => name.parse(),
            None if self.round_robin => Ok(StrategyKind::RoundRobin),
            None => Ok(StrategyKind::Simple),
        }
    }

    /// Build every configured connection.
    pub fn build_connections(&self) -> Result<Vec<Connection>, ConfigError> {
        if self.connections.is_empty() {
            return Ok(vec![self.defaults.build()?]);
        }
        self.connections
            .iter()
            .map(|c| c.inherit(&self.defaults).build())
            .collect()
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            deadline: self.deadline.filter(|s| *s > 0).map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_config_yields_one_default_connection() {
        let cfg = ClientConfig::from_json_str("{}").unwrap();
        let conns = cfg.build_connections().unwrap();
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].host(), DEFAULT_HOST);
        assert_eq!(conns[0].port(), DEFAULT_PORT);
        assert_eq!(conns[0].transport(), DEFAULT_TRANSPORT);
        assert_eq!(conns[0].timeout(), Some(DEFAULT_TIMEOUT));
        assert_eq!(cfg.strategy_kind().unwrap(), StrategyKind::Simple);
    }

    #[test]
    fn camel_case_keys() {
        let cfg = ClientConfig::from_value(json!({
            "host": "es1",
            "port": 9999,
            "path": "cluster",
            "timeout": 5,
            "connectTimeout": 1,
            "connectionStrategy": "RoundRobin"
        }))
        .unwrap();
        let conn = &cfg.build_connections().unwrap()[0];
        assert_eq!(conn.host(), "es1");
        assert_eq!(conn.port(), 9999);
        assert_eq!(conn.path(), Some("cluster"));
        assert_eq!(conn.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(conn.connect_timeout(), Some(Duration::from_secs(1)));
        assert_eq!(cfg.strategy_kind().unwrap(), StrategyKind::RoundRobin);
    }

    #[test]
    fn legacy_round_robin_flag() {
        let cfg = ClientConfig::from_value(json!({ "roundRobin": true })).unwrap();
        assert_eq!(cfg.strategy_kind().unwrap(), StrategyKind::RoundRobin);

        // An explicit name wins over the legacy flag.
        let cfg = ClientConfig::from_value(json!({
            "roundRobin": true,
            "connectionStrategy": "Simple"
        }))
        .unwrap();
        assert_eq!(cfg.strategy_kind().unwrap(), StrategyKind::Simple);
    }

    #[test]
    fn invalid_strategy_is_rejected() {
        let cfg = ClientConfig::from_value(json!({ "connectionStrategy": "Fastest" })).unwrap();
        assert!(matches!(
            cfg.strategy_kind(),
            Err(ConfigError::InvalidStrategy(name)) if name == "Fastest"
        ));
    }

    #[test]
    fn nodes_inherit_top_level_fields() {
        let cfg = ClientConfig::from_value(json!({
            "port": 9201,
            "timeout": 2,
            "config": { "compression": true },
            "connections": [
                { "host": "a" },
                { "host": "b", "port": "80", "config": { "compression": false } }
            ]
        }))
        .unwrap();
        let conns = cfg.build_connections().unwrap();
        assert_eq!(conns.len(), 2);
        assert_eq!(conns[0].port(), 9201);
        assert_eq!(conns[0].timeout(), Some(Duration::from_secs(2)));
        assert_eq!(conns[0].config("compression").unwrap(), &json!(true));
        assert_eq!(conns[1].port(), 80);
        assert_eq!(conns[1].config("compression").unwrap(), &json!(false));
    }

    #[test]
    fn servers_alias() {
        let cfg = ClientConfig::from_value(json!({ "servers": [{ "host": "x" }, { "host": "y" }] }))
            .unwrap();
        assert_eq!(cfg.build_connections().unwrap().len(), 2);
    }

    #[test]
    fn url_headers_and_proxy_go_to_config_map() {
        let cfg = ClientConfig::from_value(json!({
            "url": "https://search.example.com/",
            "headers": { "Authorization": "Basic abc" },
            "proxy": "http://proxy:3128"
        }))
        .unwrap();
        let conn = &cfg.build_connections().unwrap()[0];
        assert_eq!(conn.base_url(), "https://search.example.com");
        assert_eq!(conn.config("headers").unwrap()["Authorization"], "Basic abc");
        assert_eq!(conn.proxy(), Some("http://proxy:3128"));
    }

    #[test]
    fn unknown_keys_are_preserved() {
        let cfg = ClientConfig::from_value(json!({ "bigintConversion": true })).unwrap();
        let conn = &cfg.build_connections().unwrap()[0];
        assert_eq!(conn.config("bigintConversion").unwrap(), &json!(true));
    }

    #[test]
    fn transport_with_parameters() {
        let cfg = ClientConfig::from_value(json!({
            "transport": { "type": "Https", "postWithRequestBody": true }
        }))
        .unwrap();
        let conn = &cfg.build_connections().unwrap()[0];
        assert_eq!(conn.transport(), "Https");
        assert_eq!(conn.scheme(), "https");
        assert_eq!(conn.transport_params()["postWithRequestBody"], json!(true));
    }

    #[test]
    fn zero_timeouts_mean_unbounded() {
        let cfg = ClientConfig::from_value(json!({ "timeout": 0, "connectTimeout": 0 })).unwrap();
        let conn = &cfg.build_connections().unwrap()[0];
        assert_eq!(conn.timeout(), None);
        assert_eq!(conn.connect_timeout(), None);
    }

    #[test]
    fn invalid_fields_fail_eagerly() {
        let cfg = ClientConfig::from_value(json!({ "connections": [{ "host": "" }] })).unwrap();
        assert!(matches!(
            cfg.build_connections(),
            Err(ConfigError::InvalidField { .. })
        ));

        assert!(ClientConfig::from_value(json!({ "port": 70000 })).is_err());
        assert!(ClientConfig::from_value(json!({ "port": "http" })).is_err());
    }

    #[test]
    fn disabled_node_from_config() {
        let cfg = ClientConfig::from_value(json!({
            "connections": [{ "host": "a", "enabled": false }, { "host": "b" }]
        }))
        .unwrap();
        let conns = cfg.build_connections().unwrap();
        assert!(!conns[0].is_enabled());
        assert!(conns[1].is_enabled());
    }

    #[test]
    fn from_urls_and_deadline() {
        let mut cfg = ClientConfig::from_urls(["http://a:9200", "http://b:9200"]);
        cfg.deadline = Some(10);
        let conns = cfg.build_connections().unwrap();
        assert_eq!(conns[1].base_url(), "http://b:9200");
        assert_eq!(cfg.dispatch_config().deadline, Some(Duration::from_secs(10)));
    }
}
