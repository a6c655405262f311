//! Request and incoming envelopes.
//!
//! Outgoing calls are always `{id, method, params}`. Everything the server
//! sends back, responses and live notifications alike, decodes into the same
//! [`Incoming`] shape; telling the two apart is the transport's job, by
//! looking the id up in its registries.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::RpcError;

/// Envelope id, either a string or an integer.
///
/// The client only ever issues string ids, but servers are free to echo
/// numbers, so both are accepted on the way in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

impl RequestId {
    /// Registry key for this id. Numbers are keyed by their decimal form.
    pub fn as_key(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Number(n) => n.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::String(s) if s.is_empty())
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// One RPC call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub method: String,
    pub params: Vec<serde_json::Value>,
}

impl Request {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Vec<serde_json::Value>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// Any frame received from the server.
///
/// A response carries `error` or `result`; a live notification carries
/// `action` and `result`. The result is kept as raw JSON so the caller can
/// decode it into whatever shape it wants.
#[derive(Debug, Deserialize)]
pub struct Incoming {
    #[serde(default)]
    pub id: Option<RequestId>,
    #[serde(default)]
    pub error: Option<RpcError>,
    #[serde(default)]
    pub result: Option<Box<RawValue>>,
    #[serde(default)]
    pub action: Option<String>,
}

impl Incoming {
    /// Decode a text or binary frame payload.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Registry key of this frame, if it carries a non-empty id.
    pub fn key(&self) -> Option<String> {
        self.id
            .as_ref()
            .filter(|id| !id.is_empty())
            .map(RequestId::as_key)
    }

    /// Raw result text; an absent result reads as JSON `null`.
    pub fn result_text(&self) -> &str {
        self.result.as_deref().map(RawValue::get).unwrap_or("null")
    }

    /// Response outcome: the raw result text, or the error object the
    /// server sent.
    pub fn into_outcome(self) -> Result<String, RpcError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(self
            .result
            .map(|raw| raw.get().to_string())
            .unwrap_or_else(|| "null".to_string()))
    }
}
