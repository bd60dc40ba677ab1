//! Outcome of a single remote aggregation query.

use core::fmt;

use super::row::ResultRow;

/// Classified transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// 401/403: the integration key was rejected.
    Unauthorized,
    /// 429.
    RateLimited,
    /// 5xx or an unexpected non-success status.
    ServerError,
    /// Connect failure or timeout.
    Network,
    /// A success status whose body could not be interpreted.
    MalformedResponse,
}

impl TransportErrorKind {
    /// Failures worth retrying after a backoff.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::RateLimited | Self::ServerError)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::Network => "network",
            Self::MalformedResponse => "malformed_response",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one pipeline execution produced.
///
/// Only `Rows` is usable; an empty result and a transport failure both
/// make the fallback orchestrator move on to the next pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// At least one row.
    Rows(Vec<ResultRow>),
    /// The query succeeded but matched nothing.
    Empty,
    TransportError {
        kind: TransportErrorKind,
        message: String,
    },
}

impl QueryOutcome {
    /// `Rows` when `rows` is non-empty, otherwise `Empty`.
    #[must_use]
    pub fn from_rows(rows: Vec<ResultRow>) -> Self {
        if rows.is_empty() {
            Self::Empty
        } else {
            Self::Rows(rows)
        }
    }

    #[must_use]
    pub fn transport_error(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self::TransportError {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self, Self::Rows(_))
    }

    #[must_use]
    pub fn rows(&self) -> &[ResultRow] {
        match self {
            Self::Rows(rows) => rows,
            Self::Empty | Self::TransportError { .. } => &[],
        }
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<ResultRow> {
        match self {
            Self::Rows(rows) => rows,
            Self::Empty | Self::TransportError { .. } => Vec::new(),
        }
    }

    /// Short label for logs and attempt records.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Rows(rows) => format!("{} rows", rows.len()),
            Self::Empty => "no data".to_string(),
            Self::TransportError { kind, .. } => kind.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn test_from_rows() {
        assert_eq!(QueryOutcome::from_rows(vec![]), QueryOutcome::Empty);
        let outcome = QueryOutcome::from_rows(vec![ResultRow::new(Map::new())]);
        assert!(outcome.is_usable());
        assert_eq!(outcome.rows().len(), 1);
    }

    #[test]
    fn test_errors_are_not_usable() {
        let outcome = QueryOutcome::transport_error(TransportErrorKind::Network, "timed out");
        assert!(!outcome.is_usable());
        assert!(outcome.rows().is_empty());
        assert_eq!(outcome.label(), "network");
    }

    #[test]
    fn test_transient_kinds() {
        assert!(TransportErrorKind::RateLimited.is_transient());
        assert!(TransportErrorKind::ServerError.is_transient());
        assert!(!TransportErrorKind::Unauthorized.is_transient());
        assert!(!TransportErrorKind::MalformedResponse.is_transient());
    }
}
