//! Tool surface: definitions, dispatch and text rendering.
//!
//! Every tool is read-only and returns a single text blob. Use
//! [`ToolExecutor::execute_to_text`] at the boundary so that no error
//! escapes to the caller.

mod analytics;
mod definitions;
mod entities;
mod format;
mod types;

pub use definitions::{
    ANALYTICS_DOMAIN, ENTITIES_DOMAIN, all_tools, analytics_tools, entity_tools,
    get_tool_by_name, get_tool_names, get_tools_by_domain,
};
pub use types::Tool;

use serde_json::Value;
use tracing::{instrument, warn};

use crate::config::DEFAULT_FANOUT_LIMIT;
use crate::error::ToolError;
use crate::query::{AnalyticsBackend, PlannedQuery};

/// Executor for Pendo tools.
///
/// Maps tool names onto simple-entity lookups or aggregation pipelines
/// against any [`AnalyticsBackend`].
pub struct ToolExecutor<'a, B> {
    backend: &'a B,
    fanout_limit: usize,
}

impl<'a, B: AnalyticsBackend> ToolExecutor<'a, B> {
    /// Create an executor with the default fan-out limit.
    #[must_use]
    pub const fn new(backend: &'a B) -> Self {
        Self {
            backend,
            fanout_limit: DEFAULT_FANOUT_LIMIT,
        }
    }

    /// Cap on per-item queries issued by one tool call.
    #[must_use]
    pub const fn with_fanout_limit(mut self, limit: usize) -> Self {
        self.fanout_limit = limit;
        self
    }

    #[must_use]
    pub const fn fanout_limit(&self) -> usize {
        self.fanout_limit
    }

    /// Execute a tool and return its text result.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTool`, `InvalidParameters` (before any remote call),
    /// or `Upstream` for failed entity lookups. Aggregation failures are
    /// reported in the text rather than as errors.
    #[instrument(skip(self, input), fields(tool_name = %name))]
    pub async fn execute(&self, name: &str, input: &Value) -> Result<String, ToolError> {
        match name {
            // Entities
            "list_pages" => self.list_pages(input).await,
            "list_features" => self.list_features(input).await,
            "get_feature_details" => self.get_feature_details(input).await,
            "list_track_events" => self.list_track_events(input).await,
            "list_segments" => self.list_segments().await,
            "get_visitor_details" => self.get_visitor_details(input).await,
            "get_account_details" => self.get_account_details(input).await,

            // Activity over time
            "get_active_visitors" => self.get_active_visitors(input).await,
            "get_usage_trend" => self.get_usage_trend(input).await,

            // Searches
            "search_visitors" => self.search_visitors(input).await,
            "search_accounts_by_metadata" => self.search_accounts_by_metadata(input).await,
            "list_account_visitors" => self.list_account_visitors(input).await,
            "search_track_events" => self.search_track_events(input).await,
            "get_most_active" => self.get_most_active(input).await,

            // Per-item
            "get_feature_adoption" => self.get_feature_adoption(input).await,
            "get_page_activity" => self.get_page_activity(input).await,
            "analyze_funnel" => self.analyze_funnel(input).await,
            "analyze_paths" => self.analyze_paths(input).await,
            "get_retention_cohort" => self.get_retention_cohort(input).await,

            // Engagement
            "get_stickiness" => self.get_stickiness(input).await,
            "get_product_engagement_score" => self.get_product_engagement_score(input).await,

            // NPS
            "get_nps_breakdown" => self.get_nps_breakdown(input).await,
            "check_nps_membership" => self.check_nps_membership(input).await,

            // Usage with fallbacks
            "analyze_usage" => self.analyze_usage(input).await,

            _ => Err(ToolError::UnknownTool(name.to_string())),
        }
    }

    /// Execute a tool, rendering any error as text.
    pub async fn execute_to_text(&self, name: &str, input: &Value) -> String {
        match self.execute(name, input).await {
            Ok(text) => text,
            Err(err) => {
                warn!(tool = name, error = %err, "Tool call failed");
                format::error(name, &err)
            }
        }
    }

    /// Pipelines this executor would run for a tool. See [`plan_tool`].
    ///
    /// # Errors
    ///
    /// Returns `UnknownTool` or `InvalidParameters`.
    pub fn plan(&self, name: &str, input: &Value) -> Result<Vec<PlannedQuery>, ToolError> {
        plan_tool(name, input, self.fanout_limit)
    }
}

/// Pipelines a tool would run, in order, without running them.
///
/// Entity tools return an empty list. For fallback chains every tier is
/// included.
///
/// # Errors
///
/// Returns `UnknownTool` or `InvalidParameters`.
pub fn plan_tool(
    name: &str,
    input: &Value,
    fanout_limit: usize,
) -> Result<Vec<PlannedQuery>, ToolError> {
    if get_tool_by_name(name).is_none() {
        return Err(ToolError::UnknownTool(name.to_string()));
    }
    analytics::plan(name, input, fanout_limit)
}
