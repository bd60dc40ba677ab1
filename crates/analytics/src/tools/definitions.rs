//! Tool catalog.
//!
//! Two domains:
//!
//! **entities (7):** catalog and record lookups over the simple-entity
//! endpoints. No aggregation pipeline involved.
//!
//! **analytics (17):** each backed by a query intent. Per-item tools
//! (feature adoption, page activity, funnels, retention) take a list and
//! fan out one pipeline per item.

use crate::intents::{self, ParamSpec, funnel_step_schema, object_schema};

use super::types::Tool;

pub const ENTITIES_DOMAIN: &str = "entities";
pub const ANALYTICS_DOMAIN: &str = "analytics";

// =============================================================================
// Parameter specs for tools that do not map 1:1 onto an intent
// =============================================================================

const APP_FILTER: &[ParamSpec] = &[ParamSpec::optional_text(
    "app_id",
    "Restrict to one application",
)];
const NO_PARAMS: &[ParamSpec] = &[];
const FEATURE_ID: &[ParamSpec] = &[ParamSpec::text("feature_id", "Feature id")];
const VISITOR_ID: &[ParamSpec] = &[ParamSpec::text("visitor_id", "Visitor id")];
const ACCOUNT_ID: &[ParamSpec] = &[ParamSpec::text("account_id", "Account id")];

const DAYS_BACK_30: ParamSpec =
    ParamSpec::integer("days_back", "Number of days to look back", 1, 90, 30);

pub(super) const FEATURE_ADOPTION_PARAMS: &[ParamSpec] = &[
    ParamSpec::text_list("feature_ids", "Features to measure", 1),
    DAYS_BACK_30,
];

pub(super) const PAGE_ACTIVITY_PARAMS: &[ParamSpec] = &[
    ParamSpec::text_list("page_ids", "Pages to measure", 1),
    DAYS_BACK_30,
];

pub(super) const FUNNEL_PARAMS: &[ParamSpec] = &[
    ParamSpec::object_list(
        "steps",
        "Ordered funnel steps: {kind: page|feature|track, id, label?}",
        2,
        funnel_step_schema,
    ),
    DAYS_BACK_30,
];

pub(super) const RETENTION_PARAMS: &[ParamSpec] = &[ParamSpec::integer(
    "weeks",
    "Number of weeks to follow the cohort",
    2,
    8,
    4,
)];

/// Get all tools (24 total: 7 entity lookups + 17 analytics).
#[must_use]
pub fn all_tools() -> Vec<Tool> {
    let mut tools = Vec::with_capacity(24);
    tools.extend(entity_tools());
    tools.extend(analytics_tools());
    tools
}

/// Catalog and record lookups.
#[must_use]
pub fn entity_tools() -> Vec<Tool> {
    vec![
        entity_tool(
            "list_pages",
            "List tagged pages, optionally for one application. Shows up to 10 pages \
             and the total count. USE THIS to find page ids for activity or path questions.",
            APP_FILTER,
        ),
        entity_tool(
            "list_features",
            "List tagged features, optionally for one application. Shows up to 10 \
             features and the total count. USE THIS to find feature ids for adoption questions.",
            APP_FILTER,
        ),
        entity_tool(
            "get_feature_details",
            "Get one feature's name, application, page and timestamps.",
            FEATURE_ID,
        ),
        entity_tool(
            "list_track_events",
            "List track event types, optionally for one application.",
            APP_FILTER,
        ),
        entity_tool(
            "list_segments",
            "List saved visitor segments. Segment ids can restrict visitor searches.",
            NO_PARAMS,
        ),
        entity_tool(
            "get_visitor_details",
            "Get one visitor's account, first and last visit, and agent metadata.",
            VISITOR_ID,
        ),
        entity_tool(
            "get_account_details",
            "Get one account's first and last visit and agent metadata.",
            ACCOUNT_ID,
        ),
    ]
}

/// Aggregation-backed tools.
#[must_use]
pub fn analytics_tools() -> Vec<Tool> {
    vec![
        // Activity over time
        intent_tool(
            "get_active_visitors",
            "active-visitors",
            "Unique visitors and event volume per day or hour. Reports total events and \
             the peak. USE THIS for 'how many people used the product' questions.",
        ),
        intent_tool(
            "get_usage_trend",
            "usage-over-time",
            "Daily or weekly unique visitors, unique accounts, events and minutes.",
        ),
        // Searches
        intent_tool(
            "search_visitors",
            "visitor-search",
            "Find visitors by account, metadata value, recency or segment. All given \
             filters must match.",
        ),
        intent_tool(
            "search_accounts_by_metadata",
            "account-search",
            "Find accounts whose metadata field equals a value.",
        ),
        intent_tool(
            "list_account_visitors",
            "account-visitors",
            "List the visitors belonging to one account.",
        ),
        intent_tool(
            "search_track_events",
            "track-event-search",
            "Track event volume per event type, optionally for one type, visitor or account.",
        ),
        intent_tool(
            "get_most_active",
            "most-active",
            "Rank visitors or accounts by event volume.",
        ),
        // Per-item activity
        fanout_tool(
            "get_feature_adoption",
            "feature-adoption",
            "Per-feature visitors, accounts, events, minutes and adoption rate against all \
             active visitors. One query per feature; long lists are truncated.",
            FEATURE_ADOPTION_PARAMS,
        ),
        fanout_tool(
            "get_page_activity",
            "page-activity",
            "Per-page visitors, accounts, events, minutes and adoption rate. One query per \
             page; long lists are truncated.",
            PAGE_ACTIVITY_PARAMS,
        ),
        fanout_tool(
            "analyze_funnel",
            "funnel-step",
            "Step-by-step conversion through an ordered list of page, feature or track \
             events, with overall conversion and the biggest drop-off.",
            FUNNEL_PARAMS,
        ),
        intent_tool(
            "analyze_paths",
            "path-analysis",
            "Most common page sequences visitors follow, optionally from a start page. Pages are ordered by day; order within one day is not guaranteed.",
        ),
        fanout_tool(
            "get_retention_cohort",
            "retention-cohort",
            "Weekly retention of visitors active in the oldest week of the range.",
            RETENTION_PARAMS,
        ),
        // Engagement
        intent_tool(
            "get_stickiness",
            "stickiness",
            "Stickiness ratio (e.g. daily over monthly active visitors) with a high, \
             moderate or low rating.",
        ),
        intent_tool(
            "get_product_engagement_score",
            "engagement-score",
            "Product Engagement Score from stickiness, adoption and growth, with a rating.",
        ),
        // NPS
        intent_tool(
            "get_nps_breakdown",
            "nps-breakdown",
            "NPS promoters, passives, detractors and score for one poll, optionally per \
             day or week.",
        ),
        intent_tool(
            "check_nps_membership",
            "nps-membership",
            "Check whether a visitor or account answered an NPS poll, and how.",
        ),
        // Usage with fallbacks
        intent_tool(
            "analyze_usage",
            "usage-analysis",
            "Feature usage per account. Falls back to broader feature, page and visitor \
             activity when detailed data is missing.",
        ),
    ]
}

fn entity_tool(name: &str, description: &str, params: &[ParamSpec]) -> Tool {
    Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: object_schema(params),
        domain: Some(ENTITIES_DOMAIN.to_string()),
        intent: None,
    }
}

fn intent_tool(name: &str, intent: &str, description: &str) -> Tool {
    let params = intents::find(intent).map_or(NO_PARAMS, |i| i.params);
    fanout_tool(name, intent, description, params)
}

fn fanout_tool(name: &str, intent: &str, description: &str, params: &[ParamSpec]) -> Tool {
    Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: object_schema(params),
        domain: Some(ANALYTICS_DOMAIN.to_string()),
        intent: Some(intent.to_string()),
    }
}

/// Get a tool by name.
#[must_use]
pub fn get_tool_by_name(name: &str) -> Option<Tool> {
    all_tools().into_iter().find(|t| t.name == name)
}

/// Get all tools for a specific domain.
#[must_use]
pub fn get_tools_by_domain(domain: &str) -> Vec<Tool> {
    all_tools()
        .into_iter()
        .filter(|t| t.domain.as_deref() == Some(domain))
        .collect()
}

/// Get tool names from a list of tools.
#[must_use]
pub fn get_tool_names(tools: &[Tool]) -> Vec<&str> {
    tools.iter().map(|t| t.name.as_str()).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_catalog_counts_and_unique_names() {
        let tools = all_tools();
        assert_eq!(tools.len(), 24);
        let names: HashSet<_> = get_tool_names(&tools).into_iter().collect();
        assert_eq!(names.len(), tools.len());
        assert_eq!(get_tools_by_domain(ENTITIES_DOMAIN).len(), 7);
        assert_eq!(get_tools_by_domain(ANALYTICS_DOMAIN).len(), 17);
    }

    #[test]
    fn test_every_analytics_tool_names_a_real_intent() {
        for tool in analytics_tools() {
            let intent = tool.intent.as_deref().unwrap();
            assert!(intents::find(intent).is_some(), "{} -> {intent}", tool.name);
        }
    }

    #[test]
    fn test_schemas_carry_bounds() {
        let tool = get_tool_by_name("get_active_visitors").unwrap();
        let days = &tool.input_schema["properties"]["days_back"];
        assert_eq!(days["minimum"], 1);
        assert_eq!(days["maximum"], 90);
        assert_eq!(days["default"], 7);

        let funnel = get_tool_by_name("analyze_funnel").unwrap();
        assert_eq!(funnel.input_schema["properties"]["steps"]["minItems"], 2);
        assert_eq!(funnel.input_schema["required"], serde_json::json!(["steps"]));
    }

    #[test]
    fn test_unknown_tool() {
        assert!(get_tool_by_name("drop_database").is_none());
    }
}
