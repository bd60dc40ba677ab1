//! Query execution seams: the backend trait, per-item fan-out and the
//! fallback chain.

mod fallback;

pub use fallback::{Attempt, AttemptResult, ChainOutcome, FallbackChain, ServedBy};

use std::future::Future;

use pendo_insights_core::{
    AccountId, AggregationRequest, AppId, FeatureId, Pipeline, QueryOutcome, VisitorId,
};

use crate::pendo::{Account, Feature, Page, PendoError, Segment, TrackType, Visitor};

/// Everything the tools need from Pendo.
///
/// [`PendoClient`](crate::pendo::PendoClient) is the production
/// implementation; tests substitute an in-memory fake.
pub trait AnalyticsBackend: Send + Sync {
    /// Run one aggregation. Never fails; failures are classified outcomes.
    fn aggregate(&self, request: &AggregationRequest) -> impl Future<Output = QueryOutcome> + Send;

    fn list_pages(
        &self,
        app_id: Option<&AppId>,
    ) -> impl Future<Output = Result<Vec<Page>, PendoError>> + Send;

    fn list_features(
        &self,
        app_id: Option<&AppId>,
    ) -> impl Future<Output = Result<Vec<Feature>, PendoError>> + Send;

    fn get_feature(&self, id: &FeatureId) -> impl Future<Output = Result<Feature, PendoError>> + Send;

    fn list_track_types(
        &self,
        app_id: Option<&AppId>,
    ) -> impl Future<Output = Result<Vec<TrackType>, PendoError>> + Send;

    fn list_segments(&self) -> impl Future<Output = Result<Vec<Segment>, PendoError>> + Send;

    fn get_visitor(&self, id: &VisitorId) -> impl Future<Output = Result<Visitor, PendoError>> + Send;

    fn get_account(&self, id: &AccountId) -> impl Future<Output = Result<Account, PendoError>> + Send;
}

/// A pipeline tagged with the intent that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedQuery {
    pub intent: &'static str,
    pub pipeline: Pipeline,
}

impl PlannedQuery {
    #[must_use]
    pub const fn new(intent: &'static str, pipeline: Pipeline) -> Self {
        Self { intent, pipeline }
    }

    #[must_use]
    pub fn request(&self) -> AggregationRequest {
        AggregationRequest::new(self.pipeline.clone())
    }
}

/// An id list split at the fan-out limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bounded<T> {
    /// Items that will be queried, in caller order.
    pub kept: Vec<T>,
    /// Items dropped because the limit was reached.
    pub omitted: Vec<T>,
}

impl<T> Bounded<T> {
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        !self.omitted.is_empty()
    }
}

/// Keep at most `limit` items, preserving order and reporting the rest.
#[must_use]
pub fn bound_fanout<T>(mut items: Vec<T>, limit: usize) -> Bounded<T> {
    let omitted = if items.len() > limit {
        items.split_off(limit)
    } else {
        Vec::new()
    };
    Bounded {
        kept: items,
        omitted,
    }
}

/// Run queries one after another, pairing each with its outcome.
pub async fn run_each<B, K>(backend: &B, queries: Vec<(K, PlannedQuery)>) -> Vec<(K, QueryOutcome)>
where
    B: AnalyticsBackend,
{
    let mut outcomes = Vec::with_capacity(queries.len());
    for (key, query) in queries {
        let outcome = backend.aggregate(&query.request()).await;
        outcomes.push((key, outcome));
    }
    outcomes
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory backend for unit tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replays scripted aggregation outcomes and records request names.
    #[derive(Default)]
    pub struct ScriptedBackend {
        outcomes: Mutex<VecDeque<QueryOutcome>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        pub fn new(outcomes: Vec<QueryOutcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    impl AnalyticsBackend for ScriptedBackend {
        fn aggregate(
            &self,
            request: &AggregationRequest,
        ) -> impl Future<Output = QueryOutcome> + Send {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(request.pipeline().name().to_string());
            }
            let outcome = self
                .outcomes
                .lock()
                .ok()
                .and_then(|mut o| o.pop_front())
                .unwrap_or(QueryOutcome::Empty);
            std::future::ready(outcome)
        }

        fn list_pages(
            &self,
            _app_id: Option<&AppId>,
        ) -> impl Future<Output = Result<Vec<Page>, PendoError>> + Send {
            std::future::ready(Ok(Vec::new()))
        }

        fn list_features(
            &self,
            _app_id: Option<&AppId>,
        ) -> impl Future<Output = Result<Vec<Feature>, PendoError>> + Send {
            std::future::ready(Ok(Vec::new()))
        }

        fn get_feature(
            &self,
            id: &FeatureId,
        ) -> impl Future<Output = Result<Feature, PendoError>> + Send {
            std::future::ready(Err(PendoError::NotFound(id.to_string())))
        }

        fn list_track_types(
            &self,
            _app_id: Option<&AppId>,
        ) -> impl Future<Output = Result<Vec<TrackType>, PendoError>> + Send {
            std::future::ready(Ok(Vec::new()))
        }

        fn list_segments(&self) -> impl Future<Output = Result<Vec<Segment>, PendoError>> + Send {
            std::future::ready(Ok(Vec::new()))
        }

        fn get_visitor(
            &self,
            id: &VisitorId,
        ) -> impl Future<Output = Result<Visitor, PendoError>> + Send {
            std::future::ready(Err(PendoError::NotFound(id.to_string())))
        }

        fn get_account(
            &self,
            id: &AccountId,
        ) -> impl Future<Output = Result<Account, PendoError>> + Send {
            std::future::ready(Err(PendoError::NotFound(id.to_string())))
        }
    }
}
