//! Connection configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::error::TransportError;

pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);

/// Hook invoked exactly once when a connection is torn down: with the
/// reason if it dropped abnormally, `None` after a caller close.
pub type DropCallback = Arc<dyn Fn(Option<&TransportError>) + Send + Sync>;

/// Socket-level options applied at dial time.
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Largest accepted message; `None` keeps the library default
    pub max_message_size: Option<usize>,
    /// Largest accepted frame; `None` keeps the library default
    pub max_frame_size: Option<usize>,
    /// Disable Nagle's algorithm on the TCP socket
    pub disable_nagle: bool,
}

impl TransportOptions {
    pub(crate) fn websocket_config(&self) -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        if let Some(size) = self.max_message_size {
            config.max_message_size = Some(size);
        }
        if let Some(size) = self.max_frame_size {
            config.max_frame_size = Some(size);
        }
        config
    }
}

/// Connection configuration.
#[derive(Clone)]
pub struct ConnectOptions {
    /// Bound on the WebSocket opening handshake
    pub handshake_timeout: Duration,
    /// Default wait for a response to one request
    pub response_timeout: Duration,
    /// Ping period. Zero disables the heartbeat.
    pub heartbeat_interval: Duration,
    pub transport: TransportOptions,
    /// Called once at teardown with the drop reason (`None` for a caller close)
    pub on_drop: Option<DropCallback>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            transport: TransportOptions::default(),
            on_drop: None,
        }
    }
}

impl ConnectOptions {
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_transport(mut self, transport: TransportOptions) -> Self {
        self.transport = transport;
        self
    }

    pub fn on_drop(mut self, callback: impl Fn(Option<&TransportError>) + Send + Sync + 'static) -> Self {
        self.on_drop = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("handshake_timeout", &self.handshake_timeout)
            .field("response_timeout", &self.response_timeout)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("transport", &self.transport)
            .field("on_drop", &self.on_drop.is_some())
            .finish()
    }
}
