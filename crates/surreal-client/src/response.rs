//! `query` results.
//!
//! A query may hold several statements; the server answers with one entry
//! per statement: `{"status": "OK" | "ERR", "time": "1.2ms", "result": ...}`.

use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;

use crate::decode::{FromRows, decode_auto};
use crate::error::{ClientError, QueryError, QueryErrors};

/// Outcome of one statement.
#[derive(Debug, Deserialize)]
pub struct StatementResult {
    #[serde(rename = "status", deserialize_with = "status_ok")]
    pub ok: bool,
    /// Server-side execution time
    #[serde(default, deserialize_with = "execution_time")]
    pub time: Duration,
    /// Raw rows on success, the error message on failure
    #[serde(default)]
    pub result: Option<Box<RawValue>>,
}

impl StatementResult {
    pub fn result_text(&self) -> &str {
        self.result.as_deref().map(RawValue::get).unwrap_or("null")
    }

    /// Failure message: the result string, or the raw result if it is not one.
    fn message(&self) -> String {
        serde_json::from_str::<String>(self.result_text()).unwrap_or_else(|_| self.result_text().to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct QueryResponse {
    statements: Vec<StatementResult>,
}

impl QueryResponse {
    pub fn from_raw(raw: &str) -> Result<Self, ClientError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statements(&self) -> &[StatementResult] {
        &self.statements
    }

    /// Every failed statement, in order.
    pub fn errors(&self) -> QueryErrors {
        QueryErrors(
            self.statements
                .iter()
                .enumerate()
                .filter(|(_, statement)| !statement.ok)
                .map(|(index, statement)| QueryError {
                    index,
                    message: statement.message(),
                })
                .collect(),
        )
    }

    /// Fail with [`ClientError::QueryFailed`] if any statement failed.
    pub fn check(self) -> Result<Self, ClientError> {
        let errors = self.errors();
        if errors.0.is_empty() {
            Ok(self)
        } else {
            Err(ClientError::QueryFailed(errors))
        }
    }

    /// Decode the result of statement `index`.
    pub fn take<T: FromRows>(&self, index: usize) -> Result<T, ClientError> {
        let statement = self.statements.get(index).ok_or(ClientError::UnexpectedCount {
            expected: index + 1,
            found: self.statements.len(),
        })?;
        if !statement.ok {
            return Err(ClientError::QueryFailed(QueryErrors(vec![QueryError {
                index,
                message: statement.message(),
            }])));
        }
        decode_auto(statement.result_text())
    }

    /// Summed execution time of all statements.
    pub fn total_time(&self) -> Duration {
        self.statements.iter().map(|statement| statement.time).sum()
    }
}

fn status_ok<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let status = String::deserialize(deserializer)?;
    Ok(status == "OK")
}

fn execution_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse_duration(&text).map_err(serde::de::Error::custom)
}

/// Parse a duration such as `"1.5ms"`, `"15µs"`, `"3s"` or `"1h2m3.5s"`.
///
/// Units: `ns`, `us`/`µs`/`μs`, `ms`, `s`, `m`, `h`. A bare `"0"` is zero;
/// negative durations are rejected.
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let invalid = || format!("invalid duration {text:?}");

    let mut rest = text.strip_prefix('+').unwrap_or(text);
    if rest.starts_with('-') {
        return Err(format!("negative duration {text:?}"));
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let split = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(split);

        let split = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(split);

        let scale: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            "" => return Err(format!("missing unit in duration {text:?}")),
            other => return Err(format!("unknown unit {other:?} in duration {text:?}")),
        };

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };

        // Digits past nanosecond precision of the largest unit cannot matter.
        let fraction = &fraction[..fraction.len().min(20)];
        let fraction_nanos = if fraction.is_empty() {
            0
        } else {
            let digits: u128 = fraction.parse().map_err(|_| invalid())?;
            digits * scale / 10u128.pow(fraction.len() as u32)
        };

        total = whole
            .checked_mul(scale)
            .and_then(|n| n.checked_add(fraction_nanos))
            .and_then(|n| n.checked_add(total))
            .ok_or_else(invalid)?;
        rest = tail;
    }

    u64::try_from(total)
        .map(Duration::from_nanos)
        .map_err(|_| format!("duration {text:?} out of range"))
}
