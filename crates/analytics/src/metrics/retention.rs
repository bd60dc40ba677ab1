//! Weekly retention of the week-0 cohort.

use std::collections::HashSet;

use super::percent;

#[derive(Debug, Clone, PartialEq)]
pub struct RetentionWeek {
    /// Weeks since the cohort week (0 = cohort week).
    pub week: usize,
    /// Distinct visitors active that week.
    pub active: usize,
    /// Cohort members active that week.
    pub retained: usize,
    pub retention_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetentionReport {
    pub cohort_size: usize,
    pub weeks: Vec<RetentionWeek>,
}

/// Retention relative to week 0, given weekly visitor sets oldest first.
///
/// Week k retention is `|week k ∩ week 0| / |week 0|`.
#[must_use]
pub fn retention(weeks: &[HashSet<String>]) -> RetentionReport {
    let Some(cohort) = weeks.first() else {
        return RetentionReport {
            cohort_size: 0,
            weeks: Vec::new(),
        };
    };

    let weeks = weeks
        .iter()
        .enumerate()
        .map(|(week, active)| {
            let retained = cohort.intersection(active).count();
            RetentionWeek {
                week,
                active: active.len(),
                retained,
                retention_rate: percent(retained, cohort.len()),
            }
        })
        .collect();

    RetentionReport {
        cohort_size: cohort.len(),
        weeks,
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_retention_against_week_zero() {
        let report = retention(&[
            set(&["a", "b", "c", "d"]),
            set(&["a", "b", "x"]),
            set(&["b", "y", "z"]),
        ]);
        assert_eq!(report.cohort_size, 4);
        assert!((report.weeks[0].retention_rate - 100.0).abs() < f64::EPSILON);
        assert_eq!(report.weeks[1].retained, 2);
        assert!((report.weeks[1].retention_rate - 50.0).abs() < f64::EPSILON);
        assert_eq!(report.weeks[2].active, 3);
        assert!((report.weeks[2].retention_rate - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_cohort() {
        let report = retention(&[set(&[]), set(&["a"])]);
        assert_eq!(report.cohort_size, 0);
        assert!(report.weeks[1].retention_rate.abs() < f64::EPSILON);
        assert!(retention(&[]).weeks.is_empty());
    }
}
