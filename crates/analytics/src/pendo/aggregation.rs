//! Aggregation endpoint: response classification and retry policy.
//!
//! Both are pure so they can be tested without a server; the I/O lives in
//! [`PendoClient::run_aggregation`](super::PendoClient::run_aggregation).

use std::time::Duration;

use pendo_insights_core::{QueryOutcome, ResultRow, TransportErrorKind};
use serde_json::Value;

/// First retry delay.
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Upper bound for any single retry delay, including `Retry-After`.
const BACKOFF_CAP: Duration = Duration::from_secs(5);

/// Longest body excerpt carried in an error message.
const MAX_ERROR_EXCERPT: usize = 200;

/// Classify an aggregation response from its status code and raw body.
///
/// - 2xx with a non-empty `results` array (or a bare top-level array) of
///   objects is `Rows`; a missing, null or empty list is `Empty`.
/// - 2xx with a body that is not JSON, or rows that are not objects, is
///   `MalformedResponse`.
/// - 401/403 is `Unauthorized`, 429 is `RateLimited`, everything else that is
///   not a success is `ServerError`.
#[must_use]
pub fn classify_response(status: u16, body: &str) -> QueryOutcome {
    match status {
        200..=299 => classify_success(body),
        401 | 403 => QueryOutcome::transport_error(
            TransportErrorKind::Unauthorized,
            format!("HTTP {status}: integration key rejected"),
        ),
        429 => QueryOutcome::transport_error(
            TransportErrorKind::RateLimited,
            format!("HTTP {status}: rate limited"),
        ),
        _ => QueryOutcome::transport_error(
            TransportErrorKind::ServerError,
            format!("HTTP {status}: {}", excerpt(body)),
        ),
    }
}

fn classify_success(body: &str) -> QueryOutcome {
    if body.trim().is_empty() {
        return QueryOutcome::Empty;
    }
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            return QueryOutcome::transport_error(
                TransportErrorKind::MalformedResponse,
                format!("response is not JSON: {e}"),
            );
        }
    };

    let results = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("results") {
            None | Some(Value::Null) => return QueryOutcome::Empty,
            Some(Value::Array(items)) => items,
            Some(other) => {
                return QueryOutcome::transport_error(
                    TransportErrorKind::MalformedResponse,
                    format!("'results' is {}, expected an array", type_name(&other)),
                );
            }
        },
        Value::Null => return QueryOutcome::Empty,
        other => {
            return QueryOutcome::transport_error(
                TransportErrorKind::MalformedResponse,
                format!("response is {}, expected an object", type_name(&other)),
            );
        }
    };

    let mut rows = Vec::with_capacity(results.len());
    for (index, item) in results.into_iter().enumerate() {
        match ResultRow::try_from(item) {
            Ok(row) => rows.push(row),
            Err(other) => {
                return QueryOutcome::transport_error(
                    TransportErrorKind::MalformedResponse,
                    format!("row {index} is {}, expected an object", type_name(&other)),
                );
            }
        }
    }
    QueryOutcome::from_rows(rows)
}

/// Map a `reqwest` send failure onto a transport error kind.
#[must_use]
pub fn classify_send_error(error: &reqwest::Error) -> TransportErrorKind {
    if error.is_decode() {
        TransportErrorKind::MalformedResponse
    } else {
        TransportErrorKind::Network
    }
}

/// Delay before retry number `attempt` (0-based).
///
/// Exponential from 500 ms, capped at 5 s. A server-supplied `Retry-After`
/// replaces the computed delay but is still capped.
#[must_use]
pub fn backoff_delay(attempt: u32, retry_after: Option<Duration>) -> Duration {
    if let Some(requested) = retry_after {
        return requested.min(BACKOFF_CAP);
    }
    let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
    BACKOFF_BASE.saturating_mul(factor).min(BACKOFF_CAP)
}

/// Parse a `Retry-After` header given in seconds.
#[must_use]
pub fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(MAX_ERROR_EXCERPT).collect()
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn kind(outcome: &QueryOutcome) -> Option<TransportErrorKind> {
        match outcome {
            QueryOutcome::TransportError { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    #[test]
    fn test_results_array_is_rows() {
        let outcome = classify_response(200, r#"{"results": [{"day": 1, "uniqueVisitors": 3}]}"#);
        assert_eq!(outcome.rows().len(), 1);
        assert_eq!(outcome.rows()[0].get_i64("uniqueVisitors"), Some(3));
    }

    #[test]
    fn test_top_level_array_is_rows() {
        let outcome = classify_response(200, r#"[{"a": 1}, {"a": 2}]"#);
        assert_eq!(outcome.rows().len(), 2);
    }

    #[test]
    fn test_missing_or_empty_results_is_empty() {
        assert_eq!(classify_response(200, r#"{"results": []}"#), QueryOutcome::Empty);
        assert_eq!(classify_response(200, r#"{"results": null}"#), QueryOutcome::Empty);
        assert_eq!(classify_response(200, r#"{"startTime": 0}"#), QueryOutcome::Empty);
        assert_eq!(classify_response(204, ""), QueryOutcome::Empty);
    }

    #[test]
    fn test_malformed_bodies() {
        let outcome = classify_response(200, "<html>oops</html>");
        assert_eq!(kind(&outcome), Some(TransportErrorKind::MalformedResponse));

        let outcome = classify_response(200, r#"{"results": [1, 2]}"#);
        assert_eq!(kind(&outcome), Some(TransportErrorKind::MalformedResponse));

        let outcome = classify_response(200, r#"{"results": "nope"}"#);
        assert_eq!(kind(&outcome), Some(TransportErrorKind::MalformedResponse));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(kind(&classify_response(401, "")), Some(TransportErrorKind::Unauthorized));
        assert_eq!(kind(&classify_response(403, "")), Some(TransportErrorKind::Unauthorized));
        assert_eq!(kind(&classify_response(429, "")), Some(TransportErrorKind::RateLimited));
        assert_eq!(kind(&classify_response(500, "")), Some(TransportErrorKind::ServerError));
        assert_eq!(kind(&classify_response(503, "")), Some(TransportErrorKind::ServerError));
    }

    #[test]
    fn test_other_client_error_carries_status() {
        let outcome = classify_response(400, r#"{"message": "bad pipeline"}"#);
        match outcome {
            QueryOutcome::TransportError { kind, message } => {
                assert_eq!(kind, TransportErrorKind::ServerError);
                assert!(message.starts_with("HTTP 400"));
                assert!(message.contains("bad pipeline"));
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(0, None), Duration::from_millis(500));
        assert_eq!(backoff_delay(1, None), Duration::from_secs(1));
        assert_eq!(backoff_delay(2, None), Duration::from_secs(2));
        assert_eq!(backoff_delay(4, None), Duration::from_secs(5));
        assert_eq!(backoff_delay(40, None), Duration::from_secs(5));
    }

    #[test]
    fn test_retry_after_is_capped() {
        assert_eq!(
            backoff_delay(0, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
        assert_eq!(
            backoff_delay(0, Some(Duration::from_secs(60))),
            Duration::from_secs(5)
        );
        assert_eq!(parse_retry_after(Some(" 3 ")), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after(Some("Wed, 21 Oct 2015")), None);
        assert_eq!(parse_retry_after(None), None);
    }
}
