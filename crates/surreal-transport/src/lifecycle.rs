//! Session lifecycle state.
//!
//! State only moves forward: Connecting → Open → Closed. The teardown body
//! itself lives on the connection and runs on its own task; this module owns
//! what it needs to start exactly once: the state word, the teardown signal
//! every task watches, the recorded close outcome and the drop reason.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Connecting = 0,
    Open = 1,
    Closed = 2,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }
}

pub struct Lifecycle {
    state: AtomicU8,
    closed_tx: watch::Sender<bool>,
    teardown_started: AtomicBool,
    outcome_tx: watch::Sender<Option<Result<(), TransportError>>>,
    drop_reason: Mutex<Option<TransportError>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (closed_tx, _) = watch::channel(false);
        let (outcome_tx, _) = watch::channel(None);
        Self {
            state: AtomicU8::new(SessionState::Connecting as u8),
            closed_tx,
            teardown_started: AtomicBool::new(false),
            outcome_tx,
            drop_reason: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// Connecting → Open. Returns false if the session already moved on.
    pub fn mark_open(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Connecting as u8,
                SessionState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Flip to Closed and wake everything watching for teardown.
    pub fn mark_closed(&self) {
        self.state.store(SessionState::Closed as u8, Ordering::Release);
        self.closed_tx.send_replace(true);
    }

    /// Call `start` if no teardown has been started yet, then wait for the
    /// outcome recorded with [`finish`](Self::finish).
    ///
    /// `start` must hand the teardown to a task of its own: it runs before
    /// the first await, so dropping this future never abandons it halfway.
    pub async fn close_once(&self, start: impl FnOnce()) -> Result<(), TransportError> {
        if !self.teardown_started.swap(true, Ordering::AcqRel) {
            start();
        }
        self.outcome().await
    }

    /// Record the teardown outcome and release everyone waiting on it.
    /// Only the first outcome is kept.
    pub fn finish(&self, outcome: Result<(), TransportError>) {
        self.outcome_tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        });
    }

    /// Wait for the recorded teardown outcome.
    pub async fn outcome(&self) -> Result<(), TransportError> {
        let mut rx = self.outcome_tx.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone().unwrap_or(Ok(())),
            Err(_) => Err(TransportError::ConnectionClosed),
        }
    }

    /// Resolves once teardown has been signalled.
    pub async fn closed(&self) {
        let mut rx = self.closed_tx.subscribe();
        // The sender lives as long as `self`, so this only returns on `true`.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Receiver for tasks that select on the teardown signal.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.closed_tx.subscribe()
    }

    /// Record the drop reason. Returns false if one was already recorded.
    pub fn record_drop(&self, reason: TransportError) -> bool {
        let mut slot = self.drop_reason.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(reason);
        true
    }

    pub fn drop_reason(&self) -> Option<TransportError> {
        self.drop_reason.lock().clone()
    }
}
