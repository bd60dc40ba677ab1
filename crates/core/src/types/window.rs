//! Backward-looking time windows for pipeline sources.

use core::fmt;

use serde_json::{Value, json};

use super::stage::{StageKind, ValidationError};

/// Granularity of a time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Hour,
    Day,
    Week,
    Month,
}

impl Period {
    /// Wire name of the range (e.g. `dayRange`).
    #[must_use]
    pub const fn range_name(self) -> &'static str {
        match self {
            Self::Hour => "hourRange",
            Self::Day => "dayRange",
            Self::Week => "weekRange",
            Self::Month => "monthRange",
        }
    }

    /// Plural unit used by `dateAdd` expressions.
    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Self::Hour => "hours",
            Self::Day => "days",
            Self::Week => "weeks",
            Self::Month => "months",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.range_name())
    }
}

/// Where a window is anchored before counting backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Anchor {
    /// The current instant.
    #[default]
    Now,
    /// `n` whole periods before now.
    PeriodsAgo(u32),
}

impl Anchor {
    fn render(self, period: Period) -> String {
        match self {
            Self::Now | Self::PeriodsAgo(0) => "now()".to_string(),
            Self::PeriodsAgo(n) => format!("dateAdd(now(), -{n}, \"{}\")", period.unit()),
        }
    }
}

/// A window of `|count|` periods ending at `anchor`.
///
/// `count` is always negative: windows only look backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    period: Period,
    anchor: Anchor,
    count: i32,
}

impl TimeWindow {
    /// Window covering the last `periods` periods up to now.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if `periods` is zero or does not fit the
    /// wire representation.
    pub fn last(period: Period, periods: u32) -> Result<Self, ValidationError> {
        Self::anchored(period, Anchor::Now, periods)
    }

    /// Window covering `periods` periods ending at `anchor`.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if `periods` is zero or does not fit the
    /// wire representation.
    pub fn anchored(period: Period, anchor: Anchor, periods: u32) -> Result<Self, ValidationError> {
        if periods == 0 {
            return Err(ValidationError::new(
                StageKind::Source,
                "time window must cover at least one period",
            ));
        }
        let count = i32::try_from(periods)
            .map(|p| -p)
            .map_err(|_| ValidationError::new(StageKind::Source, "time window is too long"))?;
        Ok(Self {
            period,
            anchor,
            count,
        })
    }

    #[must_use]
    pub const fn period(&self) -> Period {
        self.period
    }

    #[must_use]
    pub const fn anchor(&self) -> Anchor {
        self.anchor
    }

    /// Signed period count (always `<= -1`).
    #[must_use]
    pub const fn count(&self) -> i32 {
        self.count
    }

    /// Wire form: `{"period": "dayRange", "first": "now()", "count": -7}`.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        json!({
            "period": self.period.range_name(),
            "first": self.anchor.render(self.period),
            "count": self.count,
        })
    }
}
