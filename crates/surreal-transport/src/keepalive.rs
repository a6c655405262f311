//! Keepalive ticker.
//!
//! Runs as its own task so a reader parked on an idle socket can never
//! starve it. Writes go through the same gate as requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

use crate::connection::Shared;
use crate::error::TransportError;

pub(crate) async fn run(shared: Arc<Shared>, period: Duration) {
    let mut closed = shared.lifecycle.watch();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => break,
            _ = ticker.tick() => {}
        }

        let ping = tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => break,
            ping = shared.gate.ping() => ping,
        };

        match ping {
            Ok(()) => debug!("Heartbeat sent"),
            Err(TransportError::ConnectionClosed) => break,
            Err(e) => {
                let detail = match e {
                    TransportError::WriteFailure(detail) => detail,
                    other => other.to_string(),
                };
                let _ = shared.close(Some(TransportError::Heartbeat(detail))).await;
                break;
            }
        }
    }
    debug!("Keepalive stopped");
}
