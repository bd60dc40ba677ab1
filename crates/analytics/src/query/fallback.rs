//! Fallback orchestration.
//!
//! A chain is a primary query plus an ordered list of narrower alternatives.
//! The orchestrator walks them in order and stops at the first one that
//! returns rows:
//!
//! ```text
//! TryPrimary ──rows──▶ Usable
//!     │ empty / error
//!     ▼
//! TryFallback(0) ──rows──▶ Usable
//!     │ empty / error
//!     ▼
//!    ...
//! TryFallback(last) ── empty / error ──▶ Exhausted
//! ```
//!
//! Partial results are never merged across tiers, and a transport error at
//! any tier is treated exactly like an empty result.

use pendo_insights_core::{QueryOutcome, ResultRow, TransportErrorKind};
use tracing::{info, instrument};

use super::{AnalyticsBackend, PlannedQuery};

/// A primary query and its fallbacks, in priority order.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackChain {
    primary: PlannedQuery,
    fallbacks: Vec<PlannedQuery>,
}

/// Which tier produced the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedBy {
    Primary,
    Fallback {
        /// Position in the fallback list (0-based).
        index: usize,
        intent: &'static str,
    },
}

impl ServedBy {
    #[must_use]
    pub const fn is_fallback(self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Why a tier was not usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    Empty,
    Failed {
        kind: TransportErrorKind,
        message: String,
    },
}

/// A tier that was tried and passed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub intent: &'static str,
    pub result: AttemptResult,
}

/// Terminal state of a chain.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainOutcome {
    Usable {
        served_by: ServedBy,
        rows: Vec<ResultRow>,
        /// Tiers tried before the one that answered.
        skipped: Vec<Attempt>,
    },
    Exhausted {
        /// Every tier, in the order it was tried.
        attempts: Vec<Attempt>,
    },
}

impl ChainOutcome {
    /// Intent names of every tier that was tried, in order.
    #[must_use]
    pub fn attempted_intents(&self) -> Vec<&'static str> {
        match self {
            Self::Usable {
                served_by, skipped, ..
            } => {
                let mut intents: Vec<_> = skipped.iter().map(|a| a.intent).collect();
                if let ServedBy::Fallback { intent, .. } = served_by {
                    intents.push(*intent);
                }
                intents
            }
            Self::Exhausted { attempts } => attempts.iter().map(|a| a.intent).collect(),
        }
    }

    /// The most recent transport failure, if any tier failed that way.
    #[must_use]
    pub fn last_failure(&self) -> Option<(TransportErrorKind, &str)> {
        let attempts = match self {
            Self::Usable { skipped, .. } => skipped,
            Self::Exhausted { attempts } => attempts,
        };
        attempts.iter().rev().find_map(|a| match &a.result {
            AttemptResult::Failed { kind, message } => Some((*kind, message.as_str())),
            AttemptResult::Empty => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    TryPrimary,
    TryFallback(usize),
}

impl FallbackChain {
    #[must_use]
    pub const fn new(primary: PlannedQuery, fallbacks: Vec<PlannedQuery>) -> Self {
        Self { primary, fallbacks }
    }

    /// A chain with no fallbacks.
    #[must_use]
    pub const fn single(primary: PlannedQuery) -> Self {
        Self::new(primary, Vec::new())
    }

    #[must_use]
    pub const fn primary(&self) -> &PlannedQuery {
        &self.primary
    }

    #[must_use]
    pub fn fallbacks(&self) -> &[PlannedQuery] {
        &self.fallbacks
    }

    /// Every query in the order it would be tried.
    pub fn queries(&self) -> impl Iterator<Item = &PlannedQuery> {
        std::iter::once(&self.primary).chain(self.fallbacks.iter())
    }

    fn query(&self, state: State) -> Option<&PlannedQuery> {
        match state {
            State::TryPrimary => Some(&self.primary),
            State::TryFallback(i) => self.fallbacks.get(i),
        }
    }

    fn next(&self, state: State) -> Option<State> {
        let next = match state {
            State::TryPrimary => 0,
            State::TryFallback(i) => i + 1,
        };
        (next < self.fallbacks.len()).then_some(State::TryFallback(next))
    }

    /// Walk the chain until a tier returns rows or every tier is spent.
    #[instrument(skip_all, fields(primary = self.primary.intent, fallbacks = self.fallbacks.len()))]
    pub async fn run<B: AnalyticsBackend>(&self, backend: &B) -> ChainOutcome {
        let mut attempts = Vec::new();
        let mut state = State::TryPrimary;

        while let Some(query) = self.query(state) {
            let outcome = backend.aggregate(&query.request()).await;
            let result = match outcome {
                QueryOutcome::Rows(rows) => {
                    let served_by = match state {
                        State::TryPrimary => ServedBy::Primary,
                        State::TryFallback(index) => ServedBy::Fallback {
                            index,
                            intent: query.intent,
                        },
                    };
                    if served_by.is_fallback() {
                        info!(intent = query.intent, rows = rows.len(), "Fallback tier answered");
                    }
                    return ChainOutcome::Usable {
                        served_by,
                        rows,
                        skipped: attempts,
                    };
                }
                QueryOutcome::Empty => AttemptResult::Empty,
                QueryOutcome::TransportError { kind, message } => {
                    AttemptResult::Failed { kind, message }
                }
            };
            attempts.push(Attempt {
                intent: query.intent,
                result,
            });

            match self.next(state) {
                Some(next) => {
                    if let Some(upcoming) = self.query(next) {
                        info!(
                            from = query.intent,
                            to = upcoming.intent,
                            "No usable data, trying next tier"
                        );
                    }
                    state = next;
                }
                None => break,
            }
        }

        info!(tiers = attempts.len(), "Fallback chain exhausted");
        ChainOutcome::Exhausted { attempts }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pendo_insights_core::{Pipeline, PipelineStage, SourceEntity};
    use serde_json::Map;

    use super::*;
    use crate::query::testing::ScriptedBackend;

    fn planned(intent: &'static str) -> PlannedQuery {
        let source = PipelineStage::source(SourceEntity::Events, None).unwrap();
        PlannedQuery::new(intent, Pipeline::new(intent, vec![source]).unwrap())
    }

    fn rows(n: usize) -> QueryOutcome {
        QueryOutcome::from_rows(vec![ResultRow::new(Map::new()); n])
    }

    fn chain() -> FallbackChain {
        FallbackChain::new(
            planned("usage-analysis"),
            vec![
                planned("broad-feature-usage"),
                planned("page-activity-overview"),
                planned("basic-visitor-activity"),
            ],
        )
    }

    #[tokio::test]
    async fn test_primary_rows_stop_the_chain() {
        let backend = ScriptedBackend::new(vec![rows(2)]);
        let outcome = chain().run(&backend).await;
        assert!(matches!(
            outcome,
            ChainOutcome::Usable {
                served_by: ServedBy::Primary,
                ..
            }
        ));
        assert_eq!(backend.calls(), vec!["usage-analysis"]);
    }

    #[tokio::test]
    async fn test_second_fallback_answers_after_three_calls() {
        let backend = ScriptedBackend::new(vec![QueryOutcome::Empty, QueryOutcome::Empty, rows(3)]);
        let outcome = chain().run(&backend).await;

        assert_eq!(
            backend.calls(),
            vec!["usage-analysis", "broad-feature-usage", "page-activity-overview"]
        );
        match outcome {
            ChainOutcome::Usable {
                served_by,
                rows,
                skipped,
            } => {
                assert_eq!(
                    served_by,
                    ServedBy::Fallback {
                        index: 1,
                        intent: "page-activity-overview"
                    }
                );
                assert_eq!(rows.len(), 3);
                assert_eq!(skipped.len(), 2);
            }
            ChainOutcome::Exhausted { .. } => panic!("expected usable rows"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_is_treated_like_empty() {
        let backend = ScriptedBackend::new(vec![
            QueryOutcome::transport_error(TransportErrorKind::ServerError, "HTTP 502"),
            rows(1),
        ]);
        let outcome = chain().run(&backend).await;
        assert_eq!(backend.calls().len(), 2);
        assert_eq!(
            outcome.last_failure(),
            Some((TransportErrorKind::ServerError, "HTTP 502"))
        );
        assert_eq!(outcome.attempted_intents(), vec!["usage-analysis", "broad-feature-usage"]);
    }

    #[tokio::test]
    async fn test_exhausted_records_every_tier() {
        let backend = ScriptedBackend::new(vec![]);
        let outcome = chain().run(&backend).await;
        assert_eq!(backend.calls().len(), 4);
        assert_eq!(
            outcome.attempted_intents(),
            vec![
                "usage-analysis",
                "broad-feature-usage",
                "page-activity-overview",
                "basic-visitor-activity"
            ]
        );
        assert!(outcome.last_failure().is_none());
    }

    #[tokio::test]
    async fn test_single_query_without_fallbacks() {
        let backend = ScriptedBackend::new(vec![QueryOutcome::Empty]);
        let outcome = FallbackChain::single(planned("stickiness")).run(&backend).await;
        assert!(matches!(outcome, ChainOutcome::Exhausted { ref attempts } if attempts.len() == 1));
        assert_eq!(backend.calls(), vec!["stickiness"]);
    }
}
