//! Shape-adapting result decoding.
//!
//! The server answers record verbs with either one record or an array of
//! them depending on the target (`user` vs `user:tobie`). Callers pick the
//! shape they want and [`FromRows`] bridges the two:
//!
//! | payload | `Vec<T>`        | `One<T>`               | `Option<T>`        |
//! |---------|-----------------|------------------------|--------------------|
//! | array   | decoded as is   | first element          | first element      |
//! | value   | one-element vec | decoded as is          | decoded as is      |
//! | `null`  | empty vec       | `UnexpectedCount`      | `None`             |

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ClientError;

/// A destination shape for raw result JSON.
pub trait FromRows: Sized {
    fn from_rows(raw: &str) -> Result<Self, ClientError>;
}

/// Exactly one record out of a result that may be an array.
#[derive(Debug, Clone, PartialEq)]
pub struct One<T>(pub T);

impl<T> One<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Decode `raw` into whichever shape `T` asks for.
pub fn decode_auto<T: FromRows>(raw: &str) -> Result<T, ClientError> {
    T::from_rows(raw)
}

fn is_array(raw: &str) -> bool {
    raw.trim_start().starts_with('[')
}

fn is_null(raw: &str) -> bool {
    raw.trim() == "null"
}

impl<T: DeserializeOwned> FromRows for Vec<T> {
    fn from_rows(raw: &str) -> Result<Self, ClientError> {
        if is_array(raw) {
            Ok(serde_json::from_str(raw)?)
        } else if is_null(raw) {
            Ok(Vec::new())
        } else {
            Ok(vec![serde_json::from_str(raw)?])
        }
    }
}

impl<T: DeserializeOwned> FromRows for One<T> {
    fn from_rows(raw: &str) -> Result<Self, ClientError> {
        if is_array(raw) {
            let rows: Vec<T> = serde_json::from_str(raw)?;
            rows.into_iter()
                .next()
                .map(One)
                .ok_or(ClientError::UnexpectedCount { expected: 1, found: 0 })
        } else if is_null(raw) {
            Err(ClientError::UnexpectedCount { expected: 1, found: 0 })
        } else {
            Ok(One(serde_json::from_str(raw)?))
        }
    }
}

impl<T: DeserializeOwned> FromRows for Option<T> {
    fn from_rows(raw: &str) -> Result<Self, ClientError> {
        if is_array(raw) {
            let rows: Vec<T> = serde_json::from_str(raw)?;
            Ok(rows.into_iter().next())
        } else {
            Ok(serde_json::from_str(raw)?)
        }
    }
}

/// The payload untouched.
impl FromRows for Value {
    fn from_rows(raw: &str) -> Result<Self, ClientError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Nothing; the payload is not even parsed.
impl FromRows for () {
    fn from_rows(_raw: &str) -> Result<Self, ClientError> {
        Ok(())
    }
}
