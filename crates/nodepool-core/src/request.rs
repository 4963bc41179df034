//! Request and response types passed between the dispatcher and transports.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP-style request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            other => Err(format!("unsupported method: {other}")),
        }
    }
}

/// Request payload: structured JSON or a pre-encoded string (e.g. NDJSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestData {
    Json(Value),
    Raw(String),
}

impl RequestData {
    /// Returns `true` if there is nothing to send.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Json(Value::Null) => true,
            Self::Json(Value::Object(map)) => map.is_empty(),
            Self::Json(Value::Array(items)) => items.is_empty(),
            Self::Json(_) => false,
            Self::Raw(s) => s.is_empty(),
        }
    }

    /// Encode the payload as a request body.
    pub fn to_body(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Json(v) => serde_json::to_string(v),
            Self::Raw(s) => Ok(s.clone()),
        }
    }
}

/// A logical request. The dispatcher passes it through to the transport
/// unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub path: String,
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<RequestData>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
}

impl Request {
    pub fn new(path: impl Into<String>, method: Method) -> Self {
        Self {
            path: path.into(),
            method,
            data: None,
            query: BTreeMap::new(),
        }
    }

    /// Attach a JSON body.
    pub fn with_json(mut self, data: Value) -> Self {
        self.data = Some(RequestData::Json(data));
        self
    }

    /// Attach a pre-encoded body.
    pub fn with_raw(mut self, data: impl Into<String>) -> Self {
        self.data = Some(RequestData::Raw(data.into()));
        self
    }

    /// Add a query string parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Returns `true` if the request carries a non-empty body.
    pub fn has_data(&self) -> bool {
        self.data.as_ref().is_some_and(|d| !d.is_empty())
    }
}

/// How the dispatcher should treat a well-formed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// The request succeeded.
    Ok,
    /// The node reported an error for this request.
    Error,
    /// The request succeeded on some shards and failed on others.
    PartialFailure,
}

/// Transport-level metadata about how a response was obtained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferInfo {
    pub method: Option<Method>,
    pub http_code: u16,
    pub url: Option<String>,
}

/// A response returned by a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: u16,
    body: String,
    data: Value,
    query_time: Option<Duration>,
    transfer_info: TransferInfo,
}

impl Response {
    /// Build a response from a raw body. Bodies that are not JSON are kept
    /// verbatim and exposed as `{"message": body}`.
    pub fn new(body: impl Into<String>, status: u16) -> Self {
        let body = body.into();
        let data = if body.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&body)
                .unwrap_or_else(|_| serde_json::json!({ "message": body.clone() }))
        };
        Self {
            status,
            body,
            data,
            query_time: None,
            transfer_info: TransferInfo::default(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// The decoded JSON body.
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn into_data(self) -> Value {
        self.data
    }

    pub fn query_time(&self) -> Option<Duration> {
        self.query_time
    }

    pub fn set_query_time(&mut self, elapsed: Duration) {
        self.query_time = Some(elapsed);
    }

    pub fn transfer_info(&self) -> &TransferInfo {
        &self.transfer_info
    }

    pub fn set_transfer_info(&mut self, info: TransferInfo) {
        self.transfer_info = info;
    }

    /// Returns `true` if the body carries an `error` member.
    pub fn has_error(&self) -> bool {
        self.data.get("error").is_some_and(|e| !e.is_null())
    }

    /// Human-readable error message: a string `error` as-is, or
    /// `type: reason` for structured errors.
    pub fn error_message(&self) -> Option<String> {
        let error = self.data.get("error")?;
        match error {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => {
                let kind = obj.get("type").and_then(Value::as_str);
                let reason = obj.get("reason").and_then(Value::as_str);
                Some(match (kind, reason) {
                    (Some(k), Some(r)) => format!("{k}: {r}"),
                    (Some(k), None) => k.to_string(),
                    (None, Some(r)) => r.to_string(),
                    (None, None) => error.to_string(),
                })
            }
            other => Some(other.to_string()),
        }
    }

    /// Number of shards that failed, when the body reports shard statistics.
    pub fn failed_shards(&self) -> u64 {
        self.data
            .get("_shards")
            .and_then(|s| s.get("failed"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    pub fn has_failed_shards(&self) -> bool {
        self.failed_shards() > 0
    }

    /// Classify this response for the dispatcher.
    pub fn outcome(&self) -> ResponseStatus {
        if self.has_error() {
            ResponseStatus::Error
        } else if self.has_failed_shards() {
            ResponseStatus::PartialFailure
        } else {
            ResponseStatus::Ok
        }
    }

    /// Returns `true` for a clean answer: no application error in the body
    /// and a status below 400. [`outcome`](Self::outcome) is what the
    /// dispatcher uses and ignores the status, so a `404` with
    /// `found: false` is dispatched as a success yet is not `is_ok`.
    pub fn is_ok(&self) -> bool {
        self.outcome() == ResponseStatus::Ok && self.status < 400
    }
}
