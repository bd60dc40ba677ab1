//! Net Promoter Score.

use pendo_insights_core::ResultRow;
use serde_json::Value;

use super::round1;

/// Category of a single 0-10 response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NpsCategory {
    /// 9 and above.
    Promoter,
    /// At least 7, below 9.
    Passive,
    /// Below 7.
    Detractor,
}

impl NpsCategory {
    #[must_use]
    pub fn classify(response: f64) -> Self {
        if response >= 9.0 {
            Self::Promoter
        } else if response >= 7.0 {
            Self::Passive
        } else {
            Self::Detractor
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Promoter => "promoter",
            Self::Passive => "passive",
            Self::Detractor => "detractor",
        }
    }
}

/// `(promoters - detractors) / total * 100`, rounded to one decimal.
///
/// Defined as 0 when there are no responses.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score(promoters: u64, detractors: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1((promoters as f64 - detractors as f64) / total as f64 * 100.0)
}

/// Response counts per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NpsBreakdown {
    pub promoters: u64,
    pub passives: u64,
    pub detractors: u64,
}

impl NpsBreakdown {
    pub fn add(&mut self, category: NpsCategory, count: u64) {
        match category {
            NpsCategory::Promoter => self.promoters = self.promoters.saturating_add(count),
            NpsCategory::Passive => self.passives = self.passives.saturating_add(count),
            NpsCategory::Detractor => self.detractors = self.detractors.saturating_add(count),
        }
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.promoters
            .saturating_add(self.passives)
            .saturating_add(self.detractors)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total() == 0
    }

    #[must_use]
    pub fn score(&self) -> f64 {
        score(self.promoters, self.detractors, self.total())
    }

    /// Tally rows carrying `pollResponse` and an optional `responses` count.
    ///
    /// Rows without a numeric response are ignored. A row without a count
    /// stands for one response.
    #[must_use]
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a ResultRow>) -> Self {
        let mut breakdown = Self::default();
        for row in rows {
            if let Some(response) = poll_response(row) {
                let count = row
                    .get_i64("responses")
                    .and_then(|c| u64::try_from(c).ok())
                    .unwrap_or(1);
                breakdown.add(NpsCategory::classify(response), count);
            }
        }
        breakdown
    }
}

/// Breakdowns per time bucket, in first-seen bucket order.
#[must_use]
pub fn by_bucket(rows: &[ResultRow], bucket_key: &str) -> Vec<(String, NpsBreakdown)> {
    let mut buckets: Vec<(String, NpsBreakdown)> = Vec::new();
    for row in rows {
        let Some(bucket) = row.get_display(bucket_key) else {
            continue;
        };
        let tally = NpsBreakdown::from_rows([row]);
        match buckets.iter_mut().find(|(b, _)| *b == bucket) {
            Some((_, existing)) => {
                existing.add(NpsCategory::Promoter, tally.promoters);
                existing.add(NpsCategory::Passive, tally.passives);
                existing.add(NpsCategory::Detractor, tally.detractors);
            }
            None => buckets.push((bucket, tally)),
        }
    }
    buckets
}

/// One visitor's poll response.
#[derive(Debug, Clone, PartialEq)]
pub struct NpsResponse {
    pub visitor_id: String,
    pub account_id: Option<String>,
    pub response: Option<f64>,
    pub category: Option<NpsCategory>,
    /// Epoch milliseconds of the response.
    pub browser_time: Option<i64>,
}

/// Per-visitor responses from a membership query.
#[must_use]
pub fn responses(rows: &[ResultRow]) -> Vec<NpsResponse> {
    rows.iter()
        .filter_map(|row| {
            let response = poll_response(row);
            Some(NpsResponse {
                visitor_id: row.get_display("visitorId")?,
                account_id: row.get_display("accountId"),
                response,
                category: response.map(NpsCategory::classify),
                browser_time: row.get_i64("browserTime"),
            })
        })
        .collect()
}

/// Responses arrive as numbers or numeric strings. Non-finite values are
/// not responses.
fn poll_response(row: &ResultRow) -> Option<f64> {
    let response = match row.get("pollResponse")? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    response.is_finite().then_some(response)
}
