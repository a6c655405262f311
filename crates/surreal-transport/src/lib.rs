//! SurrealDB RPC transport.
//!
//! One WebSocket connection carries many concurrent request/response
//! exchanges plus live query notifications. The transport handles:
//! - Dialing with a bounded handshake
//! - Request correlation (one pending slot per outstanding call)
//! - Routing live notifications to their subscription callbacks
//! - Heartbeat pings on an independent task
//! - One-shot teardown, whichever side triggers it
//!
//! A dropped connection is terminal; callers dial a new [`Connection`].
//! Verb-level clients sit on top of the [`RpcConnection`] trait.

pub mod config;
pub mod connection;
pub mod dialer;
pub mod error;
pub mod gate;
pub mod keepalive;
pub mod lifecycle;
pub mod live;
pub mod pending;
pub mod reader;

pub use config::{ConnectOptions, DropCallback, TransportOptions};
pub use connection::{Connection, RpcConnection};
pub use error::TransportError;
pub use lifecycle::SessionState;
pub use live::{LiveCallback, LiveRegistry};
pub use pending::PendingRegistry;
pub use surreal_protocol::LiveNotification;
