//! Credential payloads for `signin` / `signup`.
//!
//! The server expects a single object parameter: namespace, database and
//! scope under their short keys, with any scope-specific fields (user, pass,
//! email, ...) alongside them at the top level.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameters for the signin/signup requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "NS", skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(rename = "DB", skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(rename = "SC", skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Scope-specific fields, flattened into the payload
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Credentials {
    /// Root or namespace user credentials.
    pub fn user(user: impl Into<String>, pass: impl Into<String>) -> Self {
        let (user, pass): (String, String) = (user.into(), pass.into());
        Self::default().with("user", user).with("pass", pass)
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Add an extra top-level field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.other.insert(key.into(), value.into());
        self
    }
}
