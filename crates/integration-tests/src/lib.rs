//! Integration tests for Pendo Insights.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p pendo-insights-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `tool_registry` - Tool catalog and schemas
//! - `pipeline_builder` - Intent templates and wire shapes
//! - `fallback_chain` - Tier ordering and terminal outcomes
//! - `tool_execution` - End-to-end tool calls against [`FakeBackend`]
//!
//! No test talks to Pendo. Everything runs through the `AnalyticsBackend`
//! seam with canned outcomes.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::{HashMap, VecDeque};
use std::future::{Future, ready};
use std::sync::Mutex;

use pendo_insights::pendo::{Account, Feature, Page, PendoError, Segment, TrackType, Visitor};
use pendo_insights::query::AnalyticsBackend;
use pendo_insights_core::{
    AccountId, AggregationRequest, AppId, FeatureId, QueryOutcome, ResultRow, VisitorId,
};
use serde_json::Value;

/// In-memory backend keyed by pipeline name.
///
/// Outcomes queued for a pipeline name are returned in order; anything
/// unscripted answers `Empty`. Every aggregation request is recorded.
#[derive(Default)]
pub struct FakeBackend {
    outcomes: Mutex<HashMap<String, VecDeque<QueryOutcome>>>,
    requests: Mutex<Vec<AggregationRequest>>,
    pages: Vec<Page>,
    features: Vec<Feature>,
    visitors: Vec<Visitor>,
}

impl FakeBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for pipelines named `name`.
    #[must_use]
    pub fn on(self, name: &str, outcome: QueryOutcome) -> Self {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.entry(name.to_string()).or_default().push_back(outcome);
        }
        self
    }

    #[must_use]
    pub fn with_pages(mut self, pages: Vec<Page>) -> Self {
        self.pages = pages;
        self
    }

    #[must_use]
    pub fn with_features(mut self, features: Vec<Feature>) -> Self {
        self.features = features;
        self
    }

    #[must_use]
    pub fn with_visitor(mut self, visitor: Visitor) -> Self {
        self.visitors.push(visitor);
        self
    }

    /// Every aggregation request received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<AggregationRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Names of the pipelines received, in order.
    #[must_use]
    pub fn pipeline_names(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| r.pipeline().name().to_string())
            .collect()
    }
}

impl AnalyticsBackend for FakeBackend {
    fn aggregate(&self, request: &AggregationRequest) -> impl Future<Output = QueryOutcome> + Send {
        let name = request.pipeline().name().to_string();
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let outcome = self
            .outcomes
            .lock()
            .ok()
            .and_then(|mut o| o.get_mut(&name).and_then(VecDeque::pop_front))
            .unwrap_or(QueryOutcome::Empty);
        ready(outcome)
    }

    fn list_pages(
        &self,
        app_id: Option<&AppId>,
    ) -> impl Future<Output = Result<Vec<Page>, PendoError>> + Send {
        let pages = self
            .pages
            .iter()
            .filter(|p| app_id.is_none_or(|app| p.app_id.as_deref() == Some(app.as_str())))
            .cloned()
            .collect();
        ready(Ok(pages))
    }

    fn list_features(
        &self,
        app_id: Option<&AppId>,
    ) -> impl Future<Output = Result<Vec<Feature>, PendoError>> + Send {
        let features = self
            .features
            .iter()
            .filter(|f| app_id.is_none_or(|app| f.app_id.as_deref() == Some(app.as_str())))
            .cloned()
            .collect();
        ready(Ok(features))
    }

    fn get_feature(&self, id: &FeatureId) -> impl Future<Output = Result<Feature, PendoError>> + Send {
        let found = self.features.iter().find(|f| f.id == id.as_str()).cloned();
        ready(found.ok_or_else(|| PendoError::NotFound(id.to_string())))
    }

    fn list_track_types(
        &self,
        _app_id: Option<&AppId>,
    ) -> impl Future<Output = Result<Vec<TrackType>, PendoError>> + Send {
        ready(Ok(Vec::new()))
    }

    fn list_segments(&self) -> impl Future<Output = Result<Vec<Segment>, PendoError>> + Send {
        ready(Ok(Vec::new()))
    }

    fn get_visitor(&self, id: &VisitorId) -> impl Future<Output = Result<Visitor, PendoError>> + Send {
        let found = self.visitors.iter().find(|v| v.id == id.as_str()).cloned();
        ready(found.ok_or_else(|| PendoError::NotFound(id.to_string())))
    }

    fn get_account(&self, id: &AccountId) -> impl Future<Output = Result<Account, PendoError>> + Send {
        ready(Err(PendoError::NotFound(id.to_string())))
    }
}

/// Rows outcome from JSON objects. Non-objects are skipped.
#[must_use]
pub fn rows(values: Vec<Value>) -> QueryOutcome {
    QueryOutcome::from_rows(
        values
            .into_iter()
            .filter_map(|v| ResultRow::try_from(v).ok())
            .collect(),
    )
}

/// Rows carrying only a `visitorId` each.
#[must_use]
pub fn visitor_rows(ids: &[&str]) -> QueryOutcome {
    rows(ids.iter().map(|id| serde_json::json!({ "visitorId": id })).collect())
}
