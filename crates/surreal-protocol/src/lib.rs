//! SurrealDB RPC protocol types.
//!
//! Envelope shapes exchanged over the WebSocket RPC endpoint, the error
//! object carried by failed responses, and the method names understood by
//! the server. Every other crate in the workspace takes its wire types
//! from here.

pub mod auth;
pub mod envelope;
pub mod error;
pub mod live;
pub mod methods;

pub use auth::Credentials;
pub use envelope::{Incoming, Request, RequestId};
pub use error::RpcError;
pub use live::{Actions, LiveNotification};
pub use methods::Methods;
