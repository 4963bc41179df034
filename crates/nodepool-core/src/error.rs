//! Error types: transport failures, terminal dispatch outcomes and
//! configuration errors.

use thiserror::Error;

use crate::request::Response;

/// Errors a [`Transport`](crate::transport::Transport) can return when
/// executing a request against a single connection.
#[derive(Debug, Error)]
pub enum TransportError {
    /// TCP connect failed (refused, unreachable, DNS).
    #[error("connect error: {0}")]
    Connect(String),

    /// The exchange did not complete within the configured duration.
    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// TLS handshake or certificate failure.
    #[error("TLS error: {0}")]
    Tls(String),

    /// HTTP exchange broke off (reset, truncated body, protocol error).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The request could not be built for this connection (bad URL,
    /// unserializable body, invalid header). Retrying elsewhere won't help.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if the failure is evidence that this specific node is
    /// unreachable or unhealthy, so another node may succeed.
    pub fn is_node_failure(&self) -> bool {
        matches!(
            self,
            Self::Connect(_) | Self::Timeout { .. } | Self::Tls(_) | Self::Http(_)
        )
    }
}

/// Terminal outcome of one dispatch call.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The pool was empty or every connection was disabled; nothing was tried.
    #[error("no enabled connections available")]
    NoConnectionsAvailable,

    /// Every candidate that was tried failed at the transport level.
    #[error("all {attempts} connection attempt(s) failed, last error: {source}")]
    ConnectionFailed {
        attempts: usize,
        #[source]
        source: Box<TransportError>,
    },

    /// The node answered with a well-formed error response.
    #[error("error response (status {status}): {reason}")]
    Response {
        status: u16,
        reason: String,
        response: Box<Response>,
    },

    /// The node answered, but some shards failed to process the request.
    #[error("partial shard failure: {failed} shard(s) failed")]
    PartialShardFailure { failed: u64, response: Box<Response> },

    /// The overall dispatch deadline passed before a new attempt could start.
    #[error("dispatch deadline exceeded after {attempts} attempt(s)")]
    DeadlineExceeded { attempts: usize },

    /// A transport failure that says nothing about node health.
    #[error(transparent)]
    Transport(TransportError),
}

impl DispatchError {
    /// Number of transport attempts made before the dispatch stopped, where
    /// the error carries one.
    pub fn attempts(&self) -> Option<usize> {
        match self {
            Self::NoConnectionsAvailable => Some(0),
            Self::ConnectionFailed { attempts, .. } | Self::DeadlineExceeded { attempts } => {
                Some(*attempts)
            }
            _ => None,
        }
    }

    /// The response attached to an application-level failure.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Response { response, .. } | Self::PartialShardFailure { response, .. } => {
                Some(response)
            }
            _ => None,
        }
    }
}

/// Configuration errors, raised eagerly when a pool or client is built.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `connectionStrategy` named an unknown strategy.
    #[error("invalid connection strategy: {0}")]
    InvalidStrategy(String),

    /// A connection referenced a transport that is not registered.
    #[error("invalid transport: {0}")]
    InvalidTransport(String),

    /// A field was missing, empty or out of range.
    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },

    /// The configuration document could not be parsed.
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("config read error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
