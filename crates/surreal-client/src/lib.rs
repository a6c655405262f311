//! SurrealDB client.
//!
//! Thin verbs (`use`, `signin`, `query`, `select`, `live`, ...) over the
//! multiplexed transport, plus decoding of raw results into the shape the
//! caller asks for.

pub mod client;
pub mod decode;
pub mod error;
pub mod response;

pub use client::{Client, Diff};
pub use decode::{FromRows, One, decode_auto};
pub use error::{ClientError, QueryError, QueryErrors};
pub use response::{QueryResponse, StatementResult, parse_duration};
pub use surreal_protocol::{Actions, Credentials, LiveNotification};
pub use surreal_transport::{ConnectOptions, Connection, RpcConnection, TransportError};
