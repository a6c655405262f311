//! Connection: one multiplexed RPC session over a WebSocket.
//!
//! Callers share a [`Connection`] and issue [`send`](Connection::send)
//! concurrently. Each call owns one pending slot until its reply, its
//! deadline or the teardown of the whole connection, whichever comes first.
//! The reader and keepalive tasks run independently and both stop on the
//! lifecycle's teardown signal.

use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::Value;
use surreal_protocol::{Incoming, LiveNotification, Request};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ConnectOptions;
use crate::dialer;
use crate::error::TransportError;
use crate::gate::WriteGate;
use crate::keepalive;
use crate::lifecycle::{Lifecycle, SessionState};
use crate::live::{LiveCallback, LiveRegistry};
use crate::pending::PendingRegistry;
use crate::reader;

/// Upper bound on sending the close frame and closing the socket.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// The RPC primitives a verb-level client needs from a connection.
///
/// Implemented by [`Connection`]; tests substitute in-memory fakes.
pub trait RpcConnection: Send + Sync + 'static {
    /// Issue one call and wait for its raw result.
    fn send(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> impl Future<Output = Result<Bytes, TransportError>> + Send;

    /// Route notifications for `subscription_id` to `callback`.
    fn register_live_callback(&self, subscription_id: &str, callback: LiveCallback) -> Result<(), TransportError>;

    /// Stop routing notifications for `subscription_id`.
    fn remove_live_callback(&self, subscription_id: &str) -> bool;

    /// Caller-initiated graceful shutdown.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// State shared by callers, the reader and the keepalive ticker.
pub(crate) struct Shared {
    pub(crate) options: ConnectOptions,
    pub(crate) gate: WriteGate,
    pub(crate) pending: PendingRegistry,
    pub(crate) live: LiveRegistry,
    pub(crate) lifecycle: Lifecycle,
    /// Runtime the connection was opened on; background work is spawned here.
    pub(crate) runtime: Handle,
}

/// Discards a pending slot when its `send` returns or is cancelled.
struct SlotGuard<'a> {
    pending: &'a PendingRegistry,
    id: &'a str,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.pending.discard(self.id);
    }
}

impl Shared {
    pub(crate) fn new(options: ConnectOptions, runtime: Handle) -> Self {
        Self {
            options,
            gate: WriteGate::detached(),
            pending: PendingRegistry::new(),
            live: LiveRegistry::new(runtime.clone()),
            lifecycle: Lifecycle::new(),
            runtime,
        }
    }

    pub(crate) async fn send(
        self: &Arc<Self>,
        method: &str,
        params: Vec<Value>,
        timeout: Duration,
    ) -> Result<Bytes, TransportError> {
        if self.lifecycle.is_closed() {
            return Err(TransportError::ConnectionClosed);
        }

        let (id, slot) = self.pending.open();
        let _guard = SlotGuard {
            pending: &self.pending,
            id: &id,
        };

        let request = Request::new(id.as_str(), method, params);
        let text = serde_json::to_string(&request).map_err(|e| TransportError::Encode(e.to_string()))?;

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        let mut closed = self.lifecycle.watch();

        debug!("→ {method} [{id}]");
        // A stalled socket holds the gate inside this write; giving up on it
        // releases the gate for everyone else, including the close path.
        let written = tokio::select! {
            written = self.gate.send_text(text) => written,
            _ = &mut deadline => return Err(timed_out(method, &id, timeout)),
            _ = closed.wait_for(|closed| *closed) => return Err(TransportError::ConnectionClosed),
        };
        if let Err(e) = written {
            if matches!(e, TransportError::WriteFailure(_)) {
                let _ = self.close(Some(e.clone())).await;
            }
            return Err(e);
        }

        tokio::select! {
            delivery = slot => delivery.unwrap_or(Err(TransportError::ConnectionClosed)),
            _ = &mut deadline => Err(timed_out(method, &id, timeout)),
            _ = closed.wait_for(|closed| *closed) => Err(TransportError::ConnectionClosed),
        }
    }

    /// Classify one frame by looking its id up in the registries.
    pub(crate) fn route(&self, payload: &[u8]) {
        let incoming = match Incoming::from_slice(payload) {
            Ok(incoming) => incoming,
            Err(e) => {
                warn!("Dropping undecodable frame: {e}");
                return;
            }
        };

        let Some(key) = incoming.key() else {
            debug!("Dropping frame without id");
            return;
        };

        if self.pending.contains(&key) {
            let outcome = incoming
                .into_outcome()
                .map(Bytes::from)
                .map_err(TransportError::from);
            if !self.pending.deliver(&key, outcome) {
                debug!("Reply for [{key}] arrived after its request gave up");
            }
            return;
        }

        if self.live.contains(&key) {
            let action = incoming.action.unwrap_or_default();
            debug!("← live {action} [{key}]");
            self.live
                .dispatch(&key, LiveNotification::new(key.as_str(), action, incoming.result));
            return;
        }

        debug!("Dropping frame for unknown id [{key}]");
    }

    /// Tear the connection down once. `reason` is `None` for a caller close.
    ///
    /// The teardown runs on its own task, so it completes even if the caller
    /// stops waiting. Every call waits for and returns the first outcome.
    pub(crate) async fn close(self: &Arc<Self>, reason: Option<TransportError>) -> Result<(), TransportError> {
        self.lifecycle
            .close_once(|| {
                self.lifecycle.mark_closed();
                let shared = self.clone();
                self.runtime.spawn(async move {
                    let outcome = shared.teardown(reason).await;
                    shared.lifecycle.finish(outcome);
                });
            })
            .await
    }

    async fn teardown(&self, reason: Option<TransportError>) -> Result<(), TransportError> {
        let outcome = tokio::time::timeout(CLOSE_TIMEOUT, self.gate.shutdown())
            .await
            .unwrap_or_else(|_| Err(TransportError::Close(format!("timed out after {CLOSE_TIMEOUT:?}"))));

        let released = self.pending.release_all(&TransportError::ConnectionClosed);
        let removed = self.live.clear();

        match &reason {
            Some(reason) => {
                warn!(
                    "Connection dropped: {reason} ({released} pending requests failed, {removed} live subscriptions removed)"
                );
                self.lifecycle.record_drop(reason.clone());
            }
            None => info!("Connection closed ({released} pending requests failed, {removed} live subscriptions removed)"),
        }

        if let Some(on_drop) = &self.options.on_drop {
            if catch_unwind(AssertUnwindSafe(|| on_drop(reason.as_ref()))).is_err() {
                error!("Drop hook panicked");
            }
        }

        outcome
    }
}

fn timed_out(method: &str, id: &str, after: Duration) -> TransportError {
    warn!("Request {method} [{id}] timed out after {after:?}");
    TransportError::Timeout {
        method: method.to_string(),
        after,
    }
}

/// A live RPC session.
///
/// Dropping the last handle closes the connection in the background.
pub struct Connection {
    shared: Arc<Shared>,
    _reader: JoinHandle<()>,
    _keepalive: Option<JoinHandle<()>>,
}

impl Connection {
    /// Dial `url` and start the reader and keepalive tasks.
    pub async fn connect(url: &str, options: ConnectOptions) -> Result<Self, TransportError> {
        let shared = Arc::new(Shared::new(options, Handle::current()));

        let stream = match dialer::dial(url, &shared.options).await {
            Ok(stream) => stream,
            Err(e) => {
                shared.lifecycle.mark_closed();
                return Err(e);
            }
        };

        let (sink, stream) = stream.split();
        shared.gate.attach(sink).await;
        shared.lifecycle.mark_open();
        info!("Connected to {url}");

        let reader = shared.runtime.spawn(reader::run(shared.clone(), stream));

        let heartbeat = shared.options.heartbeat_interval;
        let keepalive = if heartbeat.is_zero() {
            debug!("Heartbeat disabled");
            None
        } else {
            Some(shared.runtime.spawn(keepalive::run(shared.clone(), heartbeat)))
        };

        Ok(Self {
            shared,
            _reader: reader,
            _keepalive: keepalive,
        })
    }

    /// Issue `method` with `params`, waiting up to the configured response
    /// timeout. Server error envelopes come back as [`TransportError::Protocol`].
    pub async fn send(&self, method: &str, params: Vec<Value>) -> Result<Bytes, TransportError> {
        self.shared
            .send(method, params, self.shared.options.response_timeout)
            .await
    }

    /// Like [`send`](Self::send) with a per-call deadline.
    pub async fn send_with_timeout(
        &self,
        method: &str,
        params: Vec<Value>,
        timeout: Duration,
    ) -> Result<Bytes, TransportError> {
        self.shared.send(method, params, timeout).await
    }

    pub fn register_live_callback(&self, subscription_id: &str, callback: LiveCallback) -> Result<(), TransportError> {
        if self.shared.lifecycle.is_closed() {
            return Err(TransportError::ConnectionClosed);
        }
        self.shared.live.register(subscription_id, callback)
    }

    pub fn remove_live_callback(&self, subscription_id: &str) -> bool {
        self.shared.live.remove(subscription_id)
    }

    /// Close the connection. Idempotent; later calls return the first outcome.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.shared.close(None).await
    }

    /// Resolves once the connection has been torn down, for any reason.
    pub async fn closed(&self) {
        self.shared.lifecycle.closed().await
    }

    pub fn state(&self) -> SessionState {
        self.shared.lifecycle.state()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lifecycle.is_closed()
    }

    /// Why the connection dropped, if it dropped abnormally.
    pub fn drop_reason(&self) -> Option<TransportError> {
        self.shared.lifecycle.drop_reason()
    }

    pub fn pending_requests(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn live_subscriptions(&self) -> usize {
        self.shared.live.len()
    }
}

impl RpcConnection for Connection {
    fn send(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> impl Future<Output = Result<Bytes, TransportError>> + Send {
        Connection::send(self, method, params)
    }

    fn register_live_callback(&self, subscription_id: &str, callback: LiveCallback) -> Result<(), TransportError> {
        Connection::register_live_callback(self, subscription_id, callback)
    }

    fn remove_live_callback(&self, subscription_id: &str) -> bool {
        Connection::remove_live_callback(self, subscription_id)
    }

    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send {
        Connection::close(self)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("pending_requests", &self.pending_requests())
            .field("live_subscriptions", &self.live_subscriptions())
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.shared.lifecycle.is_closed() {
            return;
        }
        let shared = self.shared.clone();
        self.shared.runtime.spawn(async move {
            let _ = shared.close(None).await;
        });
    }
}
