//! Metrics derived from aggregation rows.
//!
//! Everything here is a pure function over [`ResultRow`] slices. Each
//! function expects the field names produced by the matching intent
//! template (`uniqueVisitors`, `totalEvents`, `visitorId`, ...).
//!
//! [`ResultRow`]: pendo_insights_core::ResultRow

pub mod activity;
pub mod engagement;
pub mod funnel;
pub mod nps;
pub mod paths;
pub mod retention;

pub use activity::{ActivitySummary, ItemActivity, PeriodActivity};
pub use engagement::{EngagementBand, EngagementScore, Stickiness, StickinessBand};
pub use funnel::{DropOff, FunnelReport, FunnelState, FunnelStep};
pub use nps::{NpsBreakdown, NpsCategory, NpsResponse};
pub use paths::{PathCount, PathReport};
pub use retention::{RetentionReport, RetentionWeek};

/// Round to one decimal place.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `part / whole` as a percentage rounded to one decimal; 0 when `whole` is 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round1(part as f64 / whole as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_rounds_to_one_decimal() {
        assert!((percent(2, 3) - 66.7).abs() < f64::EPSILON);
        assert!((percent(1, 8) - 12.5).abs() < f64::EPSILON);
        assert!(percent(5, 0).abs() < f64::EPSILON);
    }
}
