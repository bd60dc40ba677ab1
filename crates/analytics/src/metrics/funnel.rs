//! Funnel conversion over caller-ordered steps.

use std::collections::HashSet;

use pendo_insights_core::ResultRow;

use super::percent;

/// Distinct `visitorId` values in `rows`.
#[must_use]
pub fn visitor_set(rows: &[ResultRow]) -> HashSet<String> {
    rows.iter()
        .filter_map(|row| row.get_display("visitorId"))
        .collect()
}

/// Per-step visitor sets, filled one step at a time in declared order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunnelState {
    steps: Vec<HashSet<String>>,
}

/// Conversion figures for one step.
#[derive(Debug, Clone, PartialEq)]
pub struct FunnelStep {
    pub index: usize,
    /// Distinct visitors who triggered the step.
    pub visitors: usize,
    /// Visitors who also triggered the previous step.
    pub converted: usize,
    /// `converted / previous visitors` in percent. `None` for the first step.
    pub conversion_rate: Option<f64>,
}

/// Step with the largest absolute visitor loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropOff {
    pub index: usize,
    pub lost: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunnelReport {
    pub steps: Vec<FunnelStep>,
    /// Last step visitors over first step visitors, in percent.
    pub overall_conversion: f64,
    pub biggest_drop_off: Option<DropOff>,
}

impl FunnelState {
    #[must_use]
    pub const fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append the next step from its result rows.
    pub fn push_rows(&mut self, rows: &[ResultRow]) {
        self.steps.push(visitor_set(rows));
    }

    /// Append the next step from visitor ids.
    pub fn push_visitors<I, S>(&mut self, visitors: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps
            .push(visitors.into_iter().map(Into::into).collect());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Compute conversion, consuming the state.
    #[must_use]
    pub fn into_report(self) -> FunnelReport {
        let mut steps = Vec::with_capacity(self.steps.len());
        let mut biggest_drop_off: Option<DropOff> = None;
        let mut previous: Option<&HashSet<String>> = None;

        for (index, current) in self.steps.iter().enumerate() {
            let step = match previous {
                None => FunnelStep {
                    index,
                    visitors: current.len(),
                    converted: current.len(),
                    conversion_rate: None,
                },
                Some(prev) => {
                    let converted = prev.intersection(current).count();
                    let lost = prev.len() - converted;
                    if lost > 0 && biggest_drop_off.is_none_or(|d| lost > d.lost) {
                        biggest_drop_off = Some(DropOff { index, lost });
                    }
                    FunnelStep {
                        index,
                        visitors: current.len(),
                        converted,
                        conversion_rate: Some(percent(converted, prev.len())),
                    }
                }
            };
            steps.push(step);
            previous = Some(current);
        }

        let overall_conversion = match (self.steps.first(), self.steps.last()) {
            (Some(first), Some(last)) => percent(last.len(), first.len()),
            _ => 0.0,
        };

        FunnelReport {
            steps,
            overall_conversion,
            biggest_drop_off,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_step_conversion_is_intersection_over_previous() {
        let mut state = FunnelState::new();
        state.push_visitors(["v1", "v2", "v3"]);
        state.push_visitors(["v2", "v3", "v4"]);
        let report = state.into_report();

        assert_eq!(report.steps[0].conversion_rate, None);
        assert_eq!(report.steps[1].converted, 2);
        assert!(close(report.steps[1].conversion_rate.unwrap(), 66.7));
        assert!(close(report.overall_conversion, 100.0));
    }

    #[test]
    fn test_unrelated_visitor_order_does_not_matter() {
        let mut a = FunnelState::new();
        a.push_visitors(["v3", "v1", "v2"]);
        a.push_visitors(["v4", "v3", "v2", "v9"]);
        let mut b = FunnelState::new();
        b.push_visitors(["v1", "v2", "v3"]);
        b.push_visitors(["v9", "v2", "v3", "v4"]);
        assert_eq!(a.into_report(), b.into_report());
    }

    #[test]
    fn test_empty_previous_step_converts_at_zero() {
        let mut state = FunnelState::new();
        state.push_visitors(Vec::<String>::new());
        state.push_visitors(["v1"]);
        let report = state.into_report();
        assert!(close(report.steps[1].conversion_rate.unwrap(), 0.0));
        assert!(close(report.overall_conversion, 0.0));
        assert_eq!(report.biggest_drop_off, None);
    }

    #[test]
    fn test_biggest_drop_off_prefers_earliest_tie() {
        let mut state = FunnelState::new();
        state.push_visitors(["a", "b", "c", "d"]);
        state.push_visitors(["a", "b"]);
        state.push_visitors(["a"]);
        state.push_visitors(Vec::<String>::new());
        let report = state.into_report();
        assert_eq!(report.biggest_drop_off, Some(DropOff { index: 1, lost: 2 }));
        assert!(close(report.overall_conversion, 0.0));
    }

    #[test]
    fn test_visitor_set_from_rows() {
        let rows: Vec<ResultRow> = [
            serde_json::json!({"visitorId": "v1", "events": 3}),
            serde_json::json!({"visitorId": "v1", "events": 1}),
            serde_json::json!({"visitorId": 42}),
            serde_json::json!({"events": 9}),
        ]
        .into_iter()
        .map(|v| ResultRow::try_from(v).unwrap())
        .collect();
        let set = visitor_set(&rows);
        assert_eq!(set.len(), 2);
        assert!(set.contains("42"));
    }
}
