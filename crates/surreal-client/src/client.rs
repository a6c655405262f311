//! Verb-level client.
//!
//! Every verb is one `send` on the underlying [`RpcConnection`] followed by
//! decoding of the raw result.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use surreal_protocol::{Credentials, LiveNotification, Methods};
use surreal_transport::{ConnectOptions, Connection, RpcConnection};
use tracing::debug;

use crate::decode::{FromRows, decode_auto};
use crate::error::ClientError;
use crate::response::QueryResponse;

/// One JSON Patch operation, as sent by `patch` and received by live
/// queries running in diff mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    pub op: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
}

impl Diff {
    pub fn new(op: impl Into<String>, path: impl Into<String>, value: Value) -> Self {
        Self {
            op: op.into(),
            path: path.into(),
            value,
        }
    }
}

pub struct Client<C: RpcConnection = Connection> {
    conn: C,
}

impl Client<Connection> {
    /// Dial `url` and wrap the connection.
    pub async fn connect(url: &str, options: ConnectOptions) -> Result<Self, ClientError> {
        let conn = Connection::connect(url, options).await?;
        Ok(Self::new(conn))
    }
}

impl<C: RpcConnection> Client<C> {
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Bytes, ClientError> {
        debug!("{method} ({} params)", params.len());
        Ok(self.conn.send(method, params).await?)
    }

    async fn call_text(&self, method: &str, params: Vec<Value>) -> Result<String, ClientError> {
        let raw = self.call(method, params).await?;
        String::from_utf8(raw.to_vec()).map_err(|e| ClientError::Decode(e.to_string()))
    }

    // ── Session ─────────────────────────────────────────────────────────

    /// Switch to `namespace` and `database`.
    pub async fn use_ns(&self, namespace: &str, database: &str) -> Result<(), ClientError> {
        self.call(Methods::USE, vec![json!(namespace), json!(database)]).await?;
        Ok(())
    }

    /// Bind `name` to `value` for later queries.
    pub async fn set(&self, name: &str, value: impl Serialize) -> Result<(), ClientError> {
        self.call(Methods::LET, vec![json!(name), encode(value)?]).await?;
        Ok(())
    }

    pub async fn unset(&self, name: &str) -> Result<(), ClientError> {
        self.call(Methods::UNSET, vec![json!(name)]).await?;
        Ok(())
    }

    /// The authenticated record, if any.
    pub async fn info<T: FromRows>(&self) -> Result<T, ClientError> {
        let raw = self.call_text(Methods::INFO, vec![]).await?;
        decode_auto(&raw)
    }

    // ── Authentication ──────────────────────────────────────────────────

    /// Sign in. Returns the session token if the server issued one.
    pub async fn signin(&self, credentials: &Credentials) -> Result<Option<String>, ClientError> {
        let raw = self.call(Methods::SIGNIN, vec![encode(credentials)?]).await?;
        token(&raw)
    }

    /// Sign up a scope user. Returns the session token if the server issued one.
    pub async fn signup(&self, credentials: &Credentials) -> Result<Option<String>, ClientError> {
        let raw = self.call(Methods::SIGNUP, vec![encode(credentials)?]).await?;
        token(&raw)
    }

    pub async fn authenticate(&self, token: &str) -> Result<(), ClientError> {
        self.call(Methods::AUTHENTICATE, vec![json!(token)]).await?;
        Ok(())
    }

    pub async fn invalidate(&self) -> Result<(), ClientError> {
        self.call(Methods::INVALIDATE, vec![]).await?;
        Ok(())
    }

    // ── Data ────────────────────────────────────────────────────────────

    /// Run one or more `;`-separated statements with bound `vars`.
    ///
    /// Fails with [`ClientError::QueryFailed`] if any statement failed.
    pub async fn query(&self, sql: &str, vars: impl Serialize) -> Result<QueryResponse, ClientError> {
        let raw = self.call_text(Methods::QUERY, vec![json!(sql), encode(vars)?]).await?;
        QueryResponse::from_raw(&raw)?.check()
    }

    /// Select a table or one record. A missing record is [`ClientError::NotFound`].
    pub async fn select<T: FromRows>(&self, thing: &str) -> Result<T, ClientError> {
        let raw = self.call_text(Methods::SELECT, vec![json!(thing)]).await?;
        if raw.trim() == "null" {
            return Err(ClientError::NotFound(thing.to_string()));
        }
        decode_auto(&raw)
    }

    pub async fn create<T: FromRows>(&self, thing: &str, data: impl Serialize) -> Result<T, ClientError> {
        self.write(Methods::CREATE, thing, data).await
    }

    pub async fn insert<T: FromRows>(&self, table: &str, data: impl Serialize) -> Result<T, ClientError> {
        self.write(Methods::INSERT, table, data).await
    }

    /// Replace the content of a table's records or of one record.
    pub async fn update<T: FromRows>(&self, thing: &str, data: impl Serialize) -> Result<T, ClientError> {
        self.write(Methods::UPDATE, thing, data).await
    }

    /// Merge `data` into existing records.
    pub async fn merge<T: FromRows>(&self, thing: &str, data: impl Serialize) -> Result<T, ClientError> {
        self.write(Methods::MERGE, thing, data).await
    }

    pub async fn patch<T: FromRows>(&self, thing: &str, diffs: &[Diff]) -> Result<T, ClientError> {
        self.write(Methods::PATCH, thing, diffs).await
    }

    pub async fn delete<T: FromRows>(&self, thing: &str) -> Result<T, ClientError> {
        let raw = self.call_text(Methods::DELETE, vec![json!(thing)]).await?;
        decode_auto(&raw)
    }

    async fn write<T: FromRows>(&self, method: &str, thing: &str, data: impl Serialize) -> Result<T, ClientError> {
        let raw = self.call_text(method, vec![json!(thing), encode(data)?]).await?;
        decode_auto(&raw)
    }

    // ── Live queries ────────────────────────────────────────────────────

    /// Start a live query on `table` and route its notifications to
    /// `callback`. Returns the subscription id.
    pub async fn live(
        &self,
        table: &str,
        callback: impl Fn(LiveNotification) + Send + Sync + 'static,
    ) -> Result<String, ClientError> {
        let raw = self.call(Methods::LIVE, vec![json!(table)]).await?;
        let id: String = serde_json::from_slice(&raw)?;
        self.conn.register_live_callback(&id, Arc::new(callback))?;
        debug!("Live query {id} on {table}");
        Ok(id)
    }

    /// Stop a live query. The callback is removed once the server confirms.
    pub async fn kill(&self, id: &str) -> Result<(), ClientError> {
        self.call(Methods::KILL, vec![json!(id)]).await?;
        self.conn.remove_live_callback(id);
        Ok(())
    }

    // ── Server ──────────────────────────────────────────────────────────

    pub async fn version(&self) -> Result<String, ClientError> {
        let raw = self.call(Methods::VERSION, vec![]).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        self.call(Methods::PING, vec![]).await?;
        Ok(())
    }

    pub async fn close(&self) -> Result<(), ClientError> {
        Ok(self.conn.close().await?)
    }
}

fn encode(value: impl Serialize) -> Result<Value, ClientError> {
    serde_json::to_value(value).map_err(|e| ClientError::Encode(e.to_string()))
}

fn token(raw: &[u8]) -> Result<Option<String>, ClientError> {
    let value: Value = serde_json::from_slice(raw)?;
    Ok(value.as_str().map(str::to_string))
}
