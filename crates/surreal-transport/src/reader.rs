//! Reader loop: the only task that reads from the socket.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::SplitStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::connection::Shared;
use crate::dialer::WsStream;
use crate::error::TransportError;

/// Read frames until teardown or a read failure.
///
/// Undecodable and unmatched frames are dropped; only the socket failing
/// ends the loop early, and then it tears the connection down with the
/// failure as the drop reason.
pub(crate) async fn run(shared: Arc<Shared>, mut stream: SplitStream<WsStream>) {
    let mut closed = shared.lifecycle.watch();

    let failure = loop {
        let frame = tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => break None,
            frame = stream.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => shared.route(text.as_bytes()),
            Some(Ok(Message::Binary(data))) => shared.route(&data),
            Some(Ok(Message::Close(frame))) => {
                let detail = match frame {
                    Some(frame) => format!("{} {}", u16::from(frame.code), frame.reason.as_str()),
                    None => "no close frame".to_string(),
                };
                break Some(TransportError::PeerClosed(detail.trim_end().to_string()));
            }
            // Pongs answer our heartbeat; pings are answered by the library.
            Some(Ok(_)) => {}
            Some(Err(e)) => break Some(TransportError::Read(e.to_string())),
            None => break Some(TransportError::PeerClosed("stream ended".into())),
        }
    };

    if let Some(reason) = failure {
        let _ = shared.close(Some(reason)).await;
    }
    debug!("Reader loop stopped");
}
