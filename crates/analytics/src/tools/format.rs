//! Text rendering helpers shared by the tool implementations.

use chrono::DateTime;

use crate::error::ToolError;
use crate::query::{AttemptResult, ChainOutcome};

/// Maximum entries shown by list tools.
pub const LIST_PREVIEW: usize = 10;

/// Render epoch milliseconds as `YYYY-MM-DD`, or `unknown`.
#[must_use]
pub fn date(millis: Option<i64>) -> String {
    millis
        .and_then(DateTime::from_timestamp_millis)
        .map_or_else(|| "unknown".to_string(), |dt| dt.format("%Y-%m-%d").to_string())
}

/// Render a group key. Epoch milliseconds become dates (with the hour when
/// `hourly`); anything else is shown as is.
#[must_use]
pub fn period(key: &str, hourly: bool) -> String {
    let Some(dt) = key.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis) else {
        return key.to_string();
    };
    if hourly {
        dt.format("%Y-%m-%d %H:00").to_string()
    } else {
        dt.format("%Y-%m-%d").to_string()
    }
}

#[must_use]
pub fn pct(value: f64) -> String {
    format!("{value:.1}%")
}

/// "Showing N of M" footer for list tools, empty when nothing was hidden.
#[must_use]
pub fn list_footer(shown: usize, total: usize, noun: &str) -> Option<String> {
    (total > shown).then(|| format!("... and {} more {noun} ({total} total)", total - shown))
}

/// Message for a chain that produced no usable rows.
#[must_use]
pub fn no_data(subject: &str, outcome: &ChainOutcome, suggestions: &[&str]) -> String {
    let mut lines = vec![format!("No data found for {subject}.")];

    if let ChainOutcome::Exhausted { attempts } = outcome {
        if attempts.len() > 1 {
            let tried: Vec<&str> = attempts.iter().map(|a| a.intent).collect();
            lines.push(format!("Queries attempted: {}", tried.join(" -> ")));
        }
        let failures: Vec<String> = attempts
            .iter()
            .filter_map(|a| match &a.result {
                AttemptResult::Failed { kind, message } => {
                    Some(format!("  {}: {kind} ({message})", a.intent))
                }
                AttemptResult::Empty => None,
            })
            .collect();
        if !failures.is_empty() {
            lines.push("Some queries failed rather than returning no rows:".to_string());
            lines.extend(failures);
        }
    }

    if !suggestions.is_empty() {
        lines.push(String::new());
        lines.push("Suggestions:".to_string());
        lines.extend(suggestions.iter().map(|s| format!("- {s}")));
    }
    lines.join("\n")
}

/// Text blob for a failed tool call.
#[must_use]
pub fn error(tool: &str, err: &ToolError) -> String {
    match err {
        ToolError::Upstream(upstream) => match upstream.transport_kind() {
            Some(kind) => format!("Error running {tool}: {kind}: {upstream}"),
            None => format!("Error running {tool}: {upstream}"),
        },
        other => format!("Error running {tool}: {other}"),
    }
}

/// Note listing ids dropped by the fan-out limit.
#[must_use]
pub fn truncation_note(omitted: &[String], limit: usize) -> Option<String> {
    (!omitted.is_empty()).then(|| {
        format!(
            "Note: only the first {limit} ids were queried. Omitted: {}",
            omitted.join(", ")
        )
    })
}

#[cfg(test)]
mod tests {
    use pendo_insights_core::TransportErrorKind;

    use super::*;
    use crate::pendo::PendoError;
    use crate::query::Attempt;

    #[test]
    fn test_date_and_period() {
        assert_eq!(date(Some(1_700_000_000_000)), "2023-11-14");
        assert_eq!(date(None), "unknown");
        assert_eq!(period("1700000000000", false), "2023-11-14");
        assert_eq!(period("1700000000000", true), "2023-11-14 22:00");
        assert_eq!(period("week-7", false), "week-7");
    }

    #[test]
    fn test_list_footer() {
        assert_eq!(list_footer(10, 10, "pages"), None);
        assert_eq!(
            list_footer(10, 14, "pages").as_deref(),
            Some("... and 4 more pages (14 total)")
        );
    }

    #[test]
    fn test_no_data_lists_attempts_and_failures() {
        let outcome = ChainOutcome::Exhausted {
            attempts: vec![
                Attempt {
                    intent: "usage-analysis",
                    result: AttemptResult::Empty,
                },
                Attempt {
                    intent: "broad-feature-usage",
                    result: AttemptResult::Failed {
                        kind: TransportErrorKind::RateLimited,
                        message: "HTTP 429".to_string(),
                    },
                },
            ],
        };
        let text = no_data("usage", &outcome, &["Widen days_back"]);
        assert!(text.contains("usage-analysis -> broad-feature-usage"));
        assert!(text.contains("broad-feature-usage: rate_limited (HTTP 429)"));
        assert!(text.contains("- Widen days_back"));
    }

    #[test]
    fn test_error_names_transport_kind() {
        let text = error("list_pages", &ToolError::Upstream(PendoError::Unauthorized));
        assert!(text.starts_with("Error running list_pages: unauthorized"));
    }
}
