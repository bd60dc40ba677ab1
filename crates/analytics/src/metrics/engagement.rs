//! Stickiness and Product Engagement Score banding.
//!
//! The ratios themselves come from the aggregation service; this module reads
//! them out of the result row and classifies them.

use pendo_insights_core::ResultRow;

use super::round1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StickinessBand {
    High,
    Moderate,
    Low,
}

impl StickinessBand {
    /// `> 0.5` high, `> 0.2` moderate, otherwise low.
    #[must_use]
    pub fn classify(ratio: f64) -> Self {
        if ratio > 0.5 {
            Self::High
        } else if ratio > 0.2 {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stickiness {
    /// Ratio in `[0, 1]`.
    pub ratio: f64,
    pub band: StickinessBand,
}

impl Stickiness {
    #[must_use]
    pub fn new(ratio: f64) -> Self {
        Self {
            ratio,
            band: StickinessBand::classify(ratio),
        }
    }

    /// Read the ratio from a `stickiness` result row.
    ///
    /// Uses the reported `stickiness` field, or `numeratorActive /
    /// denominatorActive` when only the counts are present.
    #[must_use]
    pub fn from_rows(rows: &[ResultRow]) -> Option<Self> {
        let row = rows.first()?;
        if let Some(ratio) = row.get_f64("stickiness").filter(|r| r.is_finite()) {
            return Some(Self::new(ratio));
        }
        let numerator = row.get_f64("numeratorActive")?;
        let denominator = row.get_f64("denominatorActive")?;
        if denominator <= 0.0 {
            return Some(Self::new(0.0));
        }
        Some(Self::new(numerator / denominator))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementBand {
    Excellent,
    Good,
    Moderate,
    Low,
}

impl EngagementBand {
    /// `> 70` excellent, `> 50` good, `> 30` moderate, otherwise low.
    #[must_use]
    pub fn classify(score: f64) -> Self {
        if score > 70.0 {
            Self::Excellent
        } else if score > 50.0 {
            Self::Good
        } else if score > 30.0 {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Moderate => "moderate",
            Self::Low => "low",
        }
    }
}

/// PES and its three sub-scores, each on a 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngagementScore {
    pub stickiness: Option<f64>,
    pub adoption: Option<f64>,
    pub growth: Option<f64>,
    pub score: f64,
    pub band: EngagementBand,
}

impl EngagementScore {
    /// Read a `pes` result row.
    ///
    /// A reported `pes` value wins; otherwise the composite is the mean of
    /// the sub-scores that are present. `None` when the row has neither.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_rows(rows: &[ResultRow]) -> Option<Self> {
        let row = rows.first()?;
        let stickiness = row.get_f64("stickiness");
        let adoption = row.get_f64("adoption");
        let growth = row.get_f64("growth");

        let score = match row.get_f64("pes") {
            Some(pes) => pes,
            None => {
                let parts: Vec<f64> = [stickiness, adoption, growth].into_iter().flatten().collect();
                if parts.is_empty() {
                    return None;
                }
                parts.iter().sum::<f64>() / parts.len() as f64
            }
        };
        let score = round1(score);

        Some(Self {
            stickiness,
            adoption,
            growth,
            score,
            band: EngagementBand::classify(score),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn rows(value: serde_json::Value) -> Vec<ResultRow> {
        vec![ResultRow::try_from(value).unwrap()]
    }

    #[test]
    fn test_stickiness_bands_are_exclusive_above() {
        assert_eq!(StickinessBand::classify(0.51), StickinessBand::High);
        assert_eq!(StickinessBand::classify(0.5), StickinessBand::Moderate);
        assert_eq!(StickinessBand::classify(0.21), StickinessBand::Moderate);
        assert_eq!(StickinessBand::classify(0.2), StickinessBand::Low);
        assert_eq!(StickinessBand::classify(0.0), StickinessBand::Low);
    }

    #[test]
    fn test_engagement_bands_top_down() {
        assert_eq!(EngagementBand::classify(70.1), EngagementBand::Excellent);
        assert_eq!(EngagementBand::classify(70.0), EngagementBand::Good);
        assert_eq!(EngagementBand::classify(50.0), EngagementBand::Moderate);
        assert_eq!(EngagementBand::classify(30.0), EngagementBand::Low);
    }

    #[test]
    fn test_stickiness_from_reported_ratio() {
        let s = Stickiness::from_rows(&rows(json!({"stickiness": 0.34}))).unwrap();
        assert_eq!(s.band, StickinessBand::Moderate);
    }

    #[test]
    fn test_stickiness_from_counts() {
        let s = Stickiness::from_rows(&rows(json!({"numeratorActive": 60, "denominatorActive": 100})))
            .unwrap();
        assert!((s.ratio - 0.6).abs() < f64::EPSILON);
        assert_eq!(s.band, StickinessBand::High);

        let zero = Stickiness::from_rows(&rows(json!({"numeratorActive": 5, "denominatorActive": 0})))
            .unwrap();
        assert_eq!(zero.band, StickinessBand::Low);
        assert!(Stickiness::from_rows(&[]).is_none());
    }

    #[test]
    fn test_pes_composite_is_mean_of_subscores() {
        let pes =
            EngagementScore::from_rows(&rows(json!({"stickiness": 40, "adoption": 60, "growth": 80})))
                .unwrap();
        assert!((pes.score - 60.0).abs() < f64::EPSILON);
        assert_eq!(pes.band, EngagementBand::Good);
    }

    #[test]
    fn test_pes_reported_value_wins() {
        let pes = EngagementScore::from_rows(&rows(json!({"pes": 72.25, "growth": 10})))
            .unwrap();
        assert!((pes.score - 72.3).abs() < 1e-9);
        assert_eq!(pes.band, EngagementBand::Excellent);
        assert!(EngagementScore::from_rows(&rows(json!({"other": 1}))).is_none());
    }
}
