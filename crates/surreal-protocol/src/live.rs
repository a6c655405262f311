//! Live query notifications.
//!
//! After a successful `live` call the server pushes one frame per change,
//! addressed to the subscription id it returned:
//! `{ id: "<subscription>", action: "CREATE" | "UPDATE" | "DELETE", result }`.

use serde::de::DeserializeOwned;
use serde_json::value::RawValue;

/// Action names carried by live notifications.
pub struct Actions;

impl Actions {
    pub const CREATE: &str = "CREATE";
    pub const UPDATE: &str = "UPDATE";
    pub const DELETE: &str = "DELETE";
    pub const CLOSE: &str = "CLOSE";
}

/// One push event for a live subscription.
#[derive(Debug, Clone)]
pub struct LiveNotification {
    /// Subscription id the event is addressed to
    pub id: String,
    /// Change kind, see [`Actions`]
    pub action: String,
    /// Raw payload of the change
    pub result: Option<Box<RawValue>>,
}

impl LiveNotification {
    pub fn new(
        id: impl Into<String>,
        action: impl Into<String>,
        result: Option<Box<RawValue>>,
    ) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
            result,
        }
    }

    /// Decode the payload into a caller-chosen type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(self.result_text())
    }

    /// Raw payload text; an absent payload reads as JSON `null`.
    pub fn result_text(&self) -> &str {
        self.result.as_deref().map(RawValue::get).unwrap_or("null")
    }

    pub fn is_delete(&self) -> bool {
        self.action == Actions::DELETE
    }
}
