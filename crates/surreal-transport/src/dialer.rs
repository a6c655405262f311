//! WebSocket dialer.

use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tracing::debug;

use crate::config::ConnectOptions;
use crate::error::TransportError;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Check that `url` parses and uses the `ws` or `wss` scheme.
pub fn validate_url(url: &str) -> Result<Uri, TransportError> {
    let uri: Uri = url
        .parse()
        .map_err(|e| TransportError::InvalidUrl(format!("{url}: {e}")))?;

    match uri.scheme_str() {
        Some("ws") | Some("wss") => Ok(uri),
        Some(other) => Err(TransportError::InvalidUrl(format!(
            "unsupported connection url scheme: {other}"
        ))),
        None => Err(TransportError::InvalidUrl(format!("{url}: missing scheme"))),
    }
}

/// Open a WebSocket to `url`, bounded by the handshake timeout.
pub async fn dial(url: &str, options: &ConnectOptions) -> Result<WsStream, TransportError> {
    validate_url(url)?;

    let config = options.transport.websocket_config();
    let handshake = connect_async_with_config(url, Some(config), options.transport.disable_nagle);

    let (stream, response) = tokio::time::timeout(options.handshake_timeout, handshake)
        .await
        .map_err(|_| TransportError::HandshakeTimeout(options.handshake_timeout))?
        .map_err(|e| TransportError::Connect(e.to_string()))?;

    debug!("WebSocket handshake with {url} complete ({})", response.status());
    Ok(stream)
}
