//! Write gate: the single exclusive path to the socket's write half.
//!
//! The WebSocket sink does not allow concurrent writers, so requests,
//! heartbeats and the close frame all queue on one async mutex. Once the
//! gate is shut the sink is gone and every later write reports
//! [`TransportError::ConnectionClosed`].

use futures_util::SinkExt;
use futures_util::stream::SplitSink;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

use crate::dialer::WsStream;
use crate::error::TransportError;

pub type WsSink = SplitSink<WsStream, Message>;

pub struct WriteGate {
    sink: Mutex<Option<WsSink>>,
}

impl WriteGate {
    /// A gate with nothing attached yet; writes fail until [`attach`](Self::attach).
    pub fn detached() -> Self {
        Self {
            sink: Mutex::new(None),
        }
    }

    pub async fn attach(&self, sink: WsSink) {
        *self.sink.lock().await = Some(sink);
    }

    pub async fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.write(Message::text(text)).await
    }

    pub async fn ping(&self) -> Result<(), TransportError> {
        self.write(Message::Ping(Default::default())).await
    }

    async fn write(&self, message: Message) -> Result<(), TransportError> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(TransportError::ConnectionClosed)?;
        sink.send(message)
            .await
            .map_err(|e| TransportError::WriteFailure(e.to_string()))
    }

    /// Send a normal-closure frame (best effort) and close the sink.
    ///
    /// Only the first call touches the socket; later calls return `Ok`.
    pub async fn shutdown(&self) -> Result<(), TransportError> {
        let Some(mut sink) = self.sink.lock().await.take() else {
            return Ok(());
        };

        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        if let Err(e) = sink.send(Message::Close(Some(frame))).await {
            debug!("Close frame not sent: {e}");
        }

        match sink.close().await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::Close(e.to_string())),
        }
    }
}
