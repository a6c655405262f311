//! Transport error type.
//!
//! Errors are `Clone`: the outcome of a close and the drop reason are
//! recorded once and handed to every caller that asks for them.

use std::time::Duration;

use surreal_protocol::RpcError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("invalid connection url: {0}")]
    InvalidUrl(String),

    #[error("failed to connect to websocket: {0}")]
    Connect(String),

    #[error("websocket handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("request `{method}` timed out after {after:?}")]
    Timeout { method: String, after: Duration },

    /// The server answered with an error envelope.
    #[error("server returned error {0}")]
    Protocol(#[from] RpcError),

    #[error("connection is closed")]
    ConnectionClosed,

    #[error("failed to write message to websocket: {0}")]
    WriteFailure(String),

    #[error("failed to read message from websocket: {0}")]
    Read(String),

    #[error("connection closed by peer: {0}")]
    PeerClosed(String),

    #[error("failed to send ping to websocket: {0}")]
    Heartbeat(String),

    #[error("failed to encode request: {0}")]
    Encode(String),

    #[error("correlation id `{0}` is already pending")]
    DuplicateId(String),

    #[error("live subscription `{0}` is already registered")]
    DuplicateSubscription(String),

    #[error("failed to close websocket: {0}")]
    Close(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }

    /// Error code and message of a server error envelope.
    pub fn protocol(&self) -> Option<(i64, &str)> {
        match self {
            Self::Protocol(e) => Some((e.code, e.message.as_str())),
            _ => None,
        }
    }
}
