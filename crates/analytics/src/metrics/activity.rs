//! Time-series and per-item activity.

use pendo_insights_core::ResultRow;

/// One period of a grouped activity series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodActivity {
    /// Group key as returned (usually epoch milliseconds).
    pub period: String,
    pub unique_visitors: i64,
    pub total_events: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActivitySummary {
    pub periods: Vec<PeriodActivity>,
    pub total_events: i64,
    pub peak_unique_visitors: i64,
}

/// Summarize rows grouped by `period_key`.
///
/// Rows without the period key are skipped. Missing counters read as 0.
#[must_use]
pub fn summarize(rows: &[ResultRow], period_key: &str) -> ActivitySummary {
    let periods: Vec<PeriodActivity> = rows
        .iter()
        .filter_map(|row| {
            Some(PeriodActivity {
                period: row.get_display(period_key)?,
                unique_visitors: row.get_i64("uniqueVisitors").unwrap_or(0),
                total_events: row.get_i64("totalEvents").unwrap_or(0),
            })
        })
        .collect();

    ActivitySummary {
        total_events: periods.iter().map(|p| p.total_events).sum(),
        peak_unique_visitors: periods
            .iter()
            .map(|p| p.unique_visitors)
            .max()
            .unwrap_or(0),
        periods,
    }
}

/// Totals for one feature or page, with adoption against the active base.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemActivity {
    pub id: String,
    pub unique_visitors: i64,
    pub unique_accounts: i64,
    pub total_events: i64,
    pub total_minutes: i64,
    /// Percentage of the active base that used the item. `None` when the
    /// base could not be measured.
    pub adoption_rate: Option<f64>,
}

/// Build item totals from the single row of a `reduce` pipeline.
///
/// No rows means no usage: every counter is 0.
#[must_use]
pub fn item_activity(
    id: impl Into<String>,
    rows: &[ResultRow],
    active_base: Option<i64>,
) -> ItemActivity {
    let read = |field: &str| rows.first().and_then(|r| r.get_i64(field)).unwrap_or(0);
    let unique_visitors = read("uniqueVisitors");
    ItemActivity {
        id: id.into(),
        unique_visitors,
        unique_accounts: read("uniqueAccounts"),
        total_events: read("totalEvents"),
        total_minutes: read("totalMinutes"),
        adoption_rate: active_base.map(|base| adoption_rate(unique_visitors, base)),
    }
}

/// Distinct active visitors from the `active-base` reduce row.
#[must_use]
pub fn active_base(rows: &[ResultRow]) -> i64 {
    rows.first()
        .and_then(|row| row.get_i64("uniqueVisitors"))
        .unwrap_or(0)
}

/// `item_visitors / base` as a percentage; 0 when the base is empty.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn adoption_rate(item_visitors: i64, base: i64) -> f64 {
    if base <= 0 {
        return 0.0;
    }
    super::round1(item_visitors as f64 / base as f64 * 100.0)
}
