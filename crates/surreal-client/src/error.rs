//! Client error type.

use std::fmt;

use surreal_transport::TransportError;

/// One failed statement of a multi-statement query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    /// Position of the statement in the query
    pub index: usize,
    pub message: String,
}

/// Every failed statement of a query, in statement order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryErrors(pub Vec<QueryError>);

impl fmt::Display for QueryErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, error) in self.0.iter().enumerate() {
            if n > 0 {
                f.write_str("; ")?;
            }
            write!(f, "query {} failed with error: `{}`", error.index, error.message)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to encode parameters: {0}")]
    Encode(String),

    #[error("failed to decode result: {0}")]
    Decode(String),

    #[error("{0}")]
    QueryFailed(QueryErrors),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("expected {expected} record, got {found}")]
    UnexpectedCount { expected: usize, found: usize },
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl ClientError {
    /// Error code and message if the server answered with an error envelope.
    pub fn protocol(&self) -> Option<(i64, &str)> {
        match self {
            Self::Transport(e) => e.protocol(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_errors_list_every_failure() {
        let errors = QueryErrors(vec![
            QueryError {
                index: 0,
                message: "table not found".into(),
            },
            QueryError {
                index: 2,
                message: "parse error".into(),
            },
        ]);
        assert_eq!(
            errors.to_string(),
            "query 0 failed with error: `table not found`; query 2 failed with error: `parse error`"
        );
    }

    #[test]
    fn protocol_passes_through_transport() {
        let err = ClientError::from(TransportError::from(surreal_protocol::RpcError::new(100, "parse error")));
        assert_eq!(err.protocol(), Some((100, "parse error")));
        assert_eq!(ClientError::NotFound("user:1".into()).protocol(), None);
    }
}
