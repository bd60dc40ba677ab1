//! The intent table and its stage templates.

use pendo_insights_core::{
    Aggregate, Anchor, CompareOp, Expr, FeatureId, FieldPath, GuideId, Literal, PageId, Period,
    PipelineStage, PollId, SegmentId, SortKey, SourceEntity, StickinessPeriod, TimeWindow,
    TrackTypeId,
};
use serde_json::{Value, json};

use super::{IntentError, ParamSpec, Params, QueryIntent};

/// Row cap for raw page-event listings used by path analysis.
pub const PATH_ROW_LIMIT: i64 = 50_000;

/// Row cap for the usage analysis tiers.
const USAGE_ROW_LIMIT: i64 = 50;

/// Visitor metadata field holding the account id.
const VISITOR_ACCOUNT_FIELD: &str = "metadata.auto.accountid";
const LAST_VISIT_FIELD: &str = "metadata.auto.lastvisit";

// =============================================================================
// Shared parameter specs
// =============================================================================

const DAYS_BACK_7: ParamSpec = ParamSpec::integer("days_back", "Number of days to look back", 1, 90, 7);
const DAYS_BACK_30: ParamSpec =
    ParamSpec::integer("days_back", "Number of days to look back", 1, 90, 30);
const ACCOUNT_FILTER: ParamSpec =
    ParamSpec::optional_text("account_id", "Only include activity for this account");
const GUIDE_ID: ParamSpec = ParamSpec::text("guide_id", "Guide containing the NPS poll");
const POLL_ID: ParamSpec = ParamSpec::text("poll_id", "NPS poll id");

const fn limit(max: i64, default: i64) -> ParamSpec {
    ParamSpec::integer("limit", "Maximum number of results", 1, max, default)
}

const ACTIVE_VISITORS_PARAMS: &[ParamSpec] = &[
    DAYS_BACK_7,
    ParamSpec::choice("group_by", "Time granularity", &["day", "hour"], "day"),
];

const USAGE_TREND_PARAMS: &[ParamSpec] = &[
    DAYS_BACK_30,
    ParamSpec::choice("group_by", "Time granularity", &["day", "week"], "day"),
];

const VISITOR_SEARCH_PARAMS: &[ParamSpec] = &[
    ParamSpec::optional_text("account_id", "Only visitors belonging to this account"),
    ParamSpec::optional_text(
        "metadata_field",
        "Metadata field to match, e.g. agent.plan (requires metadata_value)",
    ),
    ParamSpec::optional_text("metadata_value", "Value the metadata field must equal"),
    ParamSpec::optional_integer(
        "last_seen_days",
        "Only visitors seen within this many days",
        1,
        365,
    ),
    ParamSpec::optional_text("segment_id", "Restrict to members of this segment"),
    limit(100, 20),
];

const ACCOUNT_SEARCH_PARAMS: &[ParamSpec] = &[
    ParamSpec::text("metadata_field", "Metadata field to match, e.g. agent.tier"),
    ParamSpec::text("metadata_value", "Value the metadata field must equal"),
    limit(100, 20),
];

const ACCOUNT_VISITORS_PARAMS: &[ParamSpec] = &[
    ParamSpec::text("account_id", "Account whose visitors to list"),
    limit(200, 50),
];

const TRACK_SEARCH_PARAMS: &[ParamSpec] = &[
    ParamSpec::optional_text("track_type_id", "Only this track event type"),
    ParamSpec::optional_text("visitor_id", "Only events from this visitor"),
    ParamSpec::optional_text("account_id", "Only events from this account"),
    DAYS_BACK_7,
    limit(100, 20),
];

const MOST_ACTIVE_PARAMS: &[ParamSpec] = &[
    ParamSpec::choice(
        "entity",
        "Rank visitors or accounts",
        &["visitors", "accounts"],
        "visitors",
    ),
    DAYS_BACK_30,
    limit(100, 10),
];

const FEATURE_ADOPTION_PARAMS: &[ParamSpec] = &[
    ParamSpec::text("feature_id", "Feature to measure"),
    DAYS_BACK_30,
];

const PAGE_ACTIVITY_PARAMS: &[ParamSpec] = &[
    ParamSpec::text("page_id", "Page to measure"),
    DAYS_BACK_30,
];

const ACTIVE_BASE_PARAMS: &[ParamSpec] = &[DAYS_BACK_30];

const FUNNEL_STEP_PARAMS: &[ParamSpec] = &[
    ParamSpec::required_choice("kind", "Event type of the step", &["page", "feature", "track"]),
    ParamSpec::text("id", "Page, feature or track type id"),
    DAYS_BACK_30,
];

const PATH_PARAMS: &[ParamSpec] = &[
    ParamSpec::integer("days_back", "Number of days to look back", 1, 30, 7),
    ParamSpec::integer("max_length", "Maximum pages per path", 2, 10, 5),
    limit(50, 10),
    ParamSpec::optional_text("start_page_id", "Only paths starting at this page"),
];

const RETENTION_WEEK_PARAMS: &[ParamSpec] = &[ParamSpec::integer(
    "weeks_ago",
    "Week offset from the current week",
    0,
    7,
    0,
)];

const STICKINESS_PARAMS: &[ParamSpec] = &[
    ParamSpec::choice(
        "numerator",
        "Shorter activity period",
        &["daily", "weekly"],
        "daily",
    ),
    ParamSpec::choice(
        "denominator",
        "Longer activity period",
        &["weekly", "monthly"],
        "monthly",
    ),
    DAYS_BACK_30,
];

const ENGAGEMENT_PARAMS: &[ParamSpec] = &[DAYS_BACK_30];

const NPS_BREAKDOWN_PARAMS: &[ParamSpec] = &[
    GUIDE_ID,
    POLL_ID,
    ParamSpec::integer("days_back", "Number of days to look back", 1, 365, 90),
    ParamSpec::choice(
        "group_by",
        "Time bucketing of responses",
        &["none", "day", "week"],
        "none",
    ),
];

const NPS_MEMBERSHIP_PARAMS: &[ParamSpec] = &[
    GUIDE_ID,
    POLL_ID,
    ParamSpec::optional_text("visitor_id", "Visitor to check"),
    ParamSpec::optional_text("account_id", "Account to check"),
    ParamSpec::integer("days_back", "Number of days to look back", 1, 365, 365),
];

const USAGE_ANALYSIS_PARAMS: &[ParamSpec] = &[DAYS_BACK_30, ACCOUNT_FILTER];

/// Item schema for funnel step definitions.
#[must_use]
pub fn funnel_step_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "kind": {"type": "string", "enum": ["page", "feature", "track"]},
            "id": {"type": "string", "minLength": 1},
            "label": {"type": "string"},
        },
        "required": ["kind", "id"],
    })
}

// =============================================================================
// Intent table
// =============================================================================

/// Every intent the builder knows.
pub static INTENTS: &[QueryIntent] = &[
    QueryIntent::new(
        "active-visitors",
        "Active visitors",
        ACTIVE_VISITORS_PARAMS,
        active_visitors,
    ),
    QueryIntent::new(
        "usage-over-time",
        "Usage over time",
        USAGE_TREND_PARAMS,
        usage_over_time,
    ),
    QueryIntent::new(
        "visitor-search",
        "Visitor search",
        VISITOR_SEARCH_PARAMS,
        visitor_search,
    ),
    QueryIntent::new(
        "account-search",
        "Account search",
        ACCOUNT_SEARCH_PARAMS,
        account_search,
    ),
    QueryIntent::new(
        "account-visitors",
        "Account visitors",
        ACCOUNT_VISITORS_PARAMS,
        account_visitors,
    ),
    QueryIntent::new(
        "track-event-search",
        "Track event search",
        TRACK_SEARCH_PARAMS,
        track_event_search,
    ),
    QueryIntent::new("most-active", "Most active", MOST_ACTIVE_PARAMS, most_active),
    QueryIntent::new(
        "feature-adoption",
        "Feature adoption",
        FEATURE_ADOPTION_PARAMS,
        feature_adoption,
    ),
    QueryIntent::new(
        "page-activity",
        "Page activity",
        PAGE_ACTIVITY_PARAMS,
        page_activity,
    ),
    QueryIntent::new("active-base", "Active base", ACTIVE_BASE_PARAMS, active_base),
    QueryIntent::new("funnel-step", "Funnel step", FUNNEL_STEP_PARAMS, funnel_step),
    QueryIntent::new("path-analysis", "Path analysis", PATH_PARAMS, path_analysis),
    QueryIntent::new(
        "retention-cohort",
        "Retention cohort week",
        RETENTION_WEEK_PARAMS,
        retention_week,
    ),
    QueryIntent::new("stickiness", "Stickiness", STICKINESS_PARAMS, stickiness),
    QueryIntent::new(
        "engagement-score",
        "Product engagement score",
        ENGAGEMENT_PARAMS,
        engagement_score,
    ),
    QueryIntent::new(
        "nps-breakdown",
        "NPS breakdown",
        NPS_BREAKDOWN_PARAMS,
        nps_breakdown,
    ),
    QueryIntent::new(
        "nps-membership",
        "NPS membership",
        NPS_MEMBERSHIP_PARAMS,
        nps_membership,
    ),
    QueryIntent::new(
        "usage-analysis",
        "Usage analysis",
        USAGE_ANALYSIS_PARAMS,
        usage_analysis,
    )
    .with_fallbacks(&[
        "broad-feature-usage",
        "page-activity-overview",
        "basic-visitor-activity",
    ]),
    QueryIntent::new(
        "broad-feature-usage",
        "Broad feature usage",
        USAGE_ANALYSIS_PARAMS,
        broad_feature_usage,
    ),
    QueryIntent::new(
        "page-activity-overview",
        "Page activity overview",
        USAGE_ANALYSIS_PARAMS,
        page_activity_overview,
    ),
    QueryIntent::new(
        "basic-visitor-activity",
        "Basic visitor activity",
        USAGE_ANALYSIS_PARAMS,
        basic_visitor_activity,
    ),
];

// =============================================================================
// Helpers
// =============================================================================

type Stages = Result<Vec<PipelineStage>, IntentError>;

fn invalid(reason: impl Into<String>) -> IntentError {
    IntentError::InvalidParameters(reason.into())
}

fn path(field: &str) -> Result<FieldPath, IntentError> {
    FieldPath::parse(field).map_err(|e| invalid(format!("field '{field}': {e}")))
}

/// Caller-supplied metadata fields are relative to `metadata.`.
fn metadata_path(field: &str) -> Result<FieldPath, IntentError> {
    if field.starts_with("metadata.") {
        path(field)
    } else {
        path(&format!("metadata.{field}"))
    }
}

fn days_window(params: &Params) -> Result<TimeWindow, IntentError> {
    Ok(TimeWindow::last(Period::Day, params.count("days_back")?)?)
}

fn field(name: &str, aggregate: Aggregate) -> (String, Aggregate) {
    (name.to_string(), aggregate)
}

fn unique_visitors() -> (String, Aggregate) {
    field("uniqueVisitors", Aggregate::count("visitorId"))
}

fn unique_accounts() -> (String, Aggregate) {
    field("uniqueAccounts", Aggregate::count("accountId"))
}

fn total_events() -> (String, Aggregate) {
    field("totalEvents", Aggregate::sum("numEvents"))
}

fn total_minutes() -> (String, Aggregate) {
    field("totalMinutes", Aggregate::sum("numMinutes"))
}

fn push_filter(stages: &mut Vec<PipelineStage>, clauses: Vec<Expr>) -> Result<(), IntentError> {
    if let Some(expr) = Expr::all(clauses) {
        stages.push(PipelineStage::filter(expr)?);
    }
    Ok(())
}

fn account_clause(params: &Params) -> Result<Vec<Expr>, IntentError> {
    let mut clauses = Vec::new();
    if let Some(account) = params.opt_text("account_id") {
        clauses.push(Expr::equals(path("accountId")?, account));
    }
    Ok(clauses)
}

// =============================================================================
// Time series
// =============================================================================

fn active_visitors(params: &Params) -> Stages {
    let group_by = params.text("group_by")?;
    let period = if group_by == "hour" {
        Period::Hour
    } else {
        Period::Day
    };
    let window = TimeWindow::last(period, params.count("days_back")?)?;
    Ok(vec![
        PipelineStage::source(SourceEntity::Events, Some(window))?,
        PipelineStage::group(&[group_by], vec![unique_visitors(), total_events()])?,
        PipelineStage::sort(vec![SortKey::asc(group_by)])?,
    ])
}

fn usage_over_time(params: &Params) -> Stages {
    let group_by = params.text("group_by")?;
    Ok(vec![
        PipelineStage::source(SourceEntity::Events, Some(days_window(params)?))?,
        PipelineStage::group(
            &[group_by],
            vec![
                unique_visitors(),
                unique_accounts(),
                total_events(),
                total_minutes(),
            ],
        )?,
        PipelineStage::sort(vec![SortKey::asc(group_by)])?,
    ])
}

// =============================================================================
// Filtered searches
// =============================================================================

fn visitor_search(params: &Params) -> Stages {
    let mut clauses = Vec::new();
    if let Some(account) = params.opt_text("account_id") {
        clauses.push(Expr::equals(path(VISITOR_ACCOUNT_FIELD)?, account));
    }
    match (
        params.opt_text("metadata_field"),
        params.opt_text("metadata_value"),
    ) {
        (Some(field), Some(value)) => clauses.push(Expr::equals(metadata_path(field)?, value)),
        (None, None) => {}
        _ => {
            return Err(invalid(
                "metadata_field and metadata_value must be provided together",
            ));
        }
    }
    if let Some(days) = params.opt_int("last_seen_days") {
        let days = u32::try_from(days).map_err(|_| invalid("last_seen_days must be positive"))?;
        clauses.push(Expr::compare(
            path(LAST_VISIT_FIELD)?,
            CompareOp::Ge,
            Literal::DaysAgo(days),
        ));
    }

    let mut stages = vec![PipelineStage::source(SourceEntity::Visitors, None)?];
    push_filter(&mut stages, clauses)?;
    if let Some(segment) = params.opt_text("segment_id") {
        stages.push(PipelineStage::segment(SegmentId::new(segment))?);
    }
    stages.extend([
        PipelineStage::select(&[
            ("visitorId", "visitorId"),
            ("accountId", VISITOR_ACCOUNT_FIELD),
            ("lastVisit", LAST_VISIT_FIELD),
        ])?,
        PipelineStage::sort(vec![SortKey::asc("visitorId")])?,
        PipelineStage::limit(params.int("limit")?)?,
    ]);
    Ok(stages)
}

fn account_search(params: &Params) -> Stages {
    let clause = Expr::equals(
        metadata_path(params.text("metadata_field")?)?,
        params.text("metadata_value")?,
    );
    Ok(vec![
        PipelineStage::source(SourceEntity::Accounts, None)?,
        PipelineStage::filter(clause)?,
        PipelineStage::select(&[
            ("accountId", "accountId"),
            ("lastVisit", LAST_VISIT_FIELD),
        ])?,
        PipelineStage::sort(vec![SortKey::asc("accountId")])?,
        PipelineStage::limit(params.int("limit")?)?,
    ])
}

fn account_visitors(params: &Params) -> Stages {
    let clause = Expr::equals(path(VISITOR_ACCOUNT_FIELD)?, params.text("account_id")?);
    Ok(vec![
        PipelineStage::source(SourceEntity::Visitors, None)?,
        PipelineStage::filter(clause)?,
        PipelineStage::select(&[("visitorId", "visitorId"), ("lastVisit", LAST_VISIT_FIELD)])?,
        PipelineStage::sort(vec![SortKey::asc("visitorId")])?,
        PipelineStage::limit(params.int("limit")?)?,
    ])
}

fn track_event_search(params: &Params) -> Stages {
    let track_type = params.opt_text("track_type_id").map(TrackTypeId::new);
    let mut clauses = Vec::new();
    if let Some(visitor) = params.opt_text("visitor_id") {
        clauses.push(Expr::equals(path("visitorId")?, visitor));
    }
    clauses.extend(account_clause(params)?);

    let mut stages = vec![PipelineStage::source(
        SourceEntity::TrackEvents(track_type),
        Some(days_window(params)?),
    )?];
    push_filter(&mut stages, clauses)?;
    stages.extend([
        PipelineStage::group(&["trackTypeId"], vec![total_events(), unique_visitors()])?,
        PipelineStage::sort(vec![SortKey::desc("totalEvents"), SortKey::asc("trackTypeId")])?,
        PipelineStage::limit(params.int("limit")?)?,
    ]);
    Ok(stages)
}

fn most_active(params: &Params) -> Stages {
    let (key, fields) = if params.text("entity")? == "accounts" {
        (
            "accountId",
            vec![total_events(), total_minutes(), unique_visitors()],
        )
    } else {
        ("visitorId", vec![total_events(), total_minutes()])
    };
    Ok(vec![
        PipelineStage::source(SourceEntity::Events, Some(days_window(params)?))?,
        PipelineStage::group(&[key], fields)?,
        PipelineStage::sort(vec![SortKey::desc("totalEvents"), SortKey::asc(key)])?,
        PipelineStage::limit(params.int("limit")?)?,
    ])
}

// =============================================================================
// Per-item activity
// =============================================================================

fn activity_totals() -> Vec<(String, Aggregate)> {
    vec![
        unique_visitors(),
        unique_accounts(),
        total_events(),
        total_minutes(),
    ]
}

fn feature_adoption(params: &Params) -> Stages {
    let feature = FeatureId::new(params.text("feature_id")?);
    Ok(vec![
        PipelineStage::source(
            SourceEntity::FeatureEvents(Some(feature)),
            Some(days_window(params)?),
        )?,
        PipelineStage::reduce(activity_totals())?,
    ])
}

fn page_activity(params: &Params) -> Stages {
    let page = PageId::new(params.text("page_id")?);
    Ok(vec![
        PipelineStage::source(
            SourceEntity::PageEvents(Some(page)),
            Some(days_window(params)?),
        )?,
        PipelineStage::reduce(activity_totals())?,
    ])
}

fn active_base(params: &Params) -> Stages {
    Ok(vec![
        PipelineStage::source(SourceEntity::Events, Some(days_window(params)?))?,
        PipelineStage::reduce(vec![unique_visitors()])?,
    ])
}

fn funnel_step(params: &Params) -> Stages {
    let id = params.text("id")?;
    let entity = match params.text("kind")? {
        "page" => SourceEntity::PageEvents(Some(PageId::new(id))),
        "feature" => SourceEntity::FeatureEvents(Some(FeatureId::new(id))),
        _ => SourceEntity::TrackEvents(Some(TrackTypeId::new(id))),
    };
    Ok(vec![
        PipelineStage::source(entity, Some(days_window(params)?))?,
        PipelineStage::group(&["visitorId"], vec![field("events", Aggregate::sum("numEvents"))])?,
        PipelineStage::sort(vec![SortKey::asc("visitorId")])?,
    ])
}

// Page events are bucketed per day, so pages within one day keep the
// engine's row order.
fn path_analysis(params: &Params) -> Stages {
    Ok(vec![
        PipelineStage::source(SourceEntity::PageEvents(None), Some(days_window(params)?))?,
        PipelineStage::select(&[("visitorId", "visitorId"), ("pageId", "pageId"), ("day", "day")])?,
        PipelineStage::sort(vec![SortKey::asc("visitorId"), SortKey::asc("day")])?,
        PipelineStage::limit(PATH_ROW_LIMIT)?,
    ])
}

fn retention_week(params: &Params) -> Stages {
    let window = TimeWindow::anchored(
        Period::Week,
        Anchor::PeriodsAgo(params.count("weeks_ago")?),
        1,
    )?;
    Ok(vec![
        PipelineStage::source(SourceEntity::Events, Some(window))?,
        PipelineStage::group(&["visitorId"], vec![field("events", Aggregate::sum("numEvents"))])?,
        PipelineStage::sort(vec![SortKey::asc("visitorId")])?,
    ])
}

// =============================================================================
// Engagement
// =============================================================================

fn stickiness_period(value: &str) -> StickinessPeriod {
    match value {
        "daily" => StickinessPeriod::Daily,
        "weekly" => StickinessPeriod::Weekly,
        _ => StickinessPeriod::Monthly,
    }
}

fn stickiness(params: &Params) -> Stages {
    Ok(vec![
        PipelineStage::source(SourceEntity::Events, Some(days_window(params)?))?,
        PipelineStage::stickiness(
            stickiness_period(params.text("numerator")?),
            stickiness_period(params.text("denominator")?),
        )?,
    ])
}

fn engagement_score(params: &Params) -> Stages {
    Ok(vec![
        PipelineStage::source(SourceEntity::Events, Some(days_window(params)?))?,
        PipelineStage::pes(),
    ])
}

// =============================================================================
// NPS
// =============================================================================

fn polls_seen(params: &Params) -> Result<PipelineStage, IntentError> {
    let entity = SourceEntity::PollsSeen {
        guide_id: GuideId::new(params.text("guide_id")?),
        poll_id: PollId::new(params.text("poll_id")?),
    };
    Ok(PipelineStage::source(entity, Some(days_window(params)?))?)
}

fn nps_breakdown(params: &Params) -> Stages {
    let keys: Vec<&str> = match params.text("group_by")? {
        "none" => vec!["pollResponse"],
        bucket => vec![bucket, "pollResponse"],
    };
    Ok(vec![
        polls_seen(params)?,
        PipelineStage::group(&keys, vec![field("responses", Aggregate::count("visitorId"))])?,
        PipelineStage::sort(keys.iter().map(|key| SortKey::asc(*key)).collect())?,
    ])
}

fn nps_membership(params: &Params) -> Stages {
    let mut clauses = Vec::new();
    if let Some(visitor) = params.opt_text("visitor_id") {
        clauses.push(Expr::equals(path("visitorId")?, visitor));
    }
    clauses.extend(account_clause(params)?);
    let Some(membership) = Expr::any(clauses) else {
        return Err(invalid("visitor_id or account_id is required"));
    };
    Ok(vec![
        polls_seen(params)?,
        PipelineStage::filter(membership)?,
        PipelineStage::select(&[
            ("visitorId", "visitorId"),
            ("accountId", "accountId"),
            ("pollResponse", "pollResponse"),
            ("browserTime", "browserTime"),
        ])?,
        PipelineStage::sort(vec![SortKey::asc("visitorId")])?,
    ])
}

// =============================================================================
// Usage analysis and its fallback tiers
// =============================================================================

fn usage_analysis(params: &Params) -> Stages {
    let mut stages = vec![PipelineStage::source(
        SourceEntity::FeatureEvents(None),
        Some(days_window(params)?),
    )?];
    push_filter(&mut stages, account_clause(params)?)?;
    stages.extend([
        PipelineStage::group(
            &["accountId", "featureId"],
            vec![total_events(), total_minutes(), unique_visitors()],
        )?,
        PipelineStage::sort(vec![
            SortKey::desc("totalEvents"),
            SortKey::asc("accountId"),
            SortKey::asc("featureId"),
        ])?,
        PipelineStage::limit(USAGE_ROW_LIMIT)?,
    ]);
    Ok(stages)
}

fn ranked_by_volume(entity: SourceEntity, key: &str, params: &Params) -> Stages {
    let mut stages = vec![PipelineStage::source(entity, Some(days_window(params)?))?];
    push_filter(&mut stages, account_clause(params)?)?;
    stages.extend([
        PipelineStage::group(
            &[key],
            vec![total_events(), unique_visitors(), unique_accounts()],
        )?,
        PipelineStage::sort(vec![SortKey::desc("totalEvents"), SortKey::asc(key)])?,
        PipelineStage::limit(USAGE_ROW_LIMIT)?,
    ]);
    Ok(stages)
}

fn broad_feature_usage(params: &Params) -> Stages {
    ranked_by_volume(SourceEntity::FeatureEvents(None), "featureId", params)
}

fn page_activity_overview(params: &Params) -> Stages {
    ranked_by_volume(SourceEntity::PageEvents(None), "pageId", params)
}

fn basic_visitor_activity(params: &Params) -> Stages {
    let mut stages = vec![PipelineStage::source(
        SourceEntity::Events,
        Some(days_window(params)?),
    )?];
    push_filter(&mut stages, account_clause(params)?)?;
    stages.extend([
        PipelineStage::group(&["day"], vec![unique_visitors(), total_events()])?,
        PipelineStage::sort(vec![SortKey::asc("day")])?,
    ]);
    Ok(stages)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::HashSet;

    use pendo_insights_core::StageKind;

    use super::*;
    use crate::intents::{build, plan_chain};

    fn window_count(pipeline: &pendo_insights_core::Pipeline) -> i32 {
        pipeline.source().unwrap().window().unwrap().count()
    }

    #[test]
    fn test_intent_names_are_unique_and_fallbacks_resolve() {
        let names: HashSet<_> = INTENTS.iter().map(|i| i.name).collect();
        assert_eq!(names.len(), INTENTS.len());
        for intent in INTENTS {
            for fallback in intent.fallbacks {
                assert!(names.contains(fallback), "{fallback} is not an intent");
            }
        }
    }

    #[test]
    fn test_every_intent_builds_from_minimal_input() {
        let minimal = json!({
            "feature_id": "f1",
            "page_id": "p1",
            "kind": "page",
            "id": "p1",
            "guide_id": "g1",
            "poll_id": "q1",
            "visitor_id": "v1",
            "account_id": "a1",
            "metadata_field": "agent.plan",
            "metadata_value": "pro",
        });
        for intent in INTENTS {
            let pipeline = build(intent.name, &minimal).unwrap();
            assert_eq!(pipeline.name(), intent.label);
            assert_eq!(pipeline.kinds()[0], StageKind::Source);
        }
    }

    #[test]
    fn test_active_visitors_window_and_group_key() {
        for (group_by, period) in [("day", "dayRange"), ("hour", "hourRange")] {
            let pipeline =
                build("active-visitors", &json!({"days_back": 14, "group_by": group_by})).unwrap();
            assert_eq!(window_count(&pipeline), -14);
            let wire = pipeline.to_wire();
            assert_eq!(wire[0]["source"]["timeSeries"]["period"], period);
            assert_eq!(wire[1]["group"]["group"], json!([group_by]));
            assert_eq!(wire[2]["sort"], json!([group_by]));
        }
    }

    #[test]
    fn test_usage_trend_rejects_hour() {
        let err = build("usage-over-time", &json!({"group_by": "hour"})).unwrap_err();
        assert!(matches!(err, IntentError::InvalidParameters(_)));
    }

    #[test]
    fn test_visitor_search_joins_predicates_with_and() {
        let pipeline = build(
            "visitor-search",
            &json!({
                "account_id": "acme",
                "metadata_field": "agent.plan",
                "metadata_value": "pro",
                "last_seen_days": 30,
                "segment_id": "seg-1",
            }),
        )
        .unwrap();
        assert_eq!(
            pipeline.kinds(),
            vec![
                StageKind::Source,
                StageKind::Filter,
                StageKind::Segment,
                StageKind::Select,
                StageKind::Sort,
                StageKind::Limit,
            ]
        );
        let wire = pipeline.to_wire();
        assert_eq!(
            wire[1]["filter"],
            "metadata.auto.accountid == \"acme\" && metadata.agent.plan == \"pro\" && \
             metadata.auto.lastvisit >= dateAdd(now(), -30, \"days\")"
        );
        assert_eq!(wire[2]["segment"]["id"], "seg-1");
        assert_eq!(wire[5]["limit"], 20);
    }

    #[test]
    fn test_visitor_search_without_predicates_has_no_filter() {
        let pipeline = build("visitor-search", &json!({"limit": 5})).unwrap();
        assert!(!pipeline.kinds().contains(&StageKind::Filter));
    }

    #[test]
    fn test_visitor_search_metadata_pair_required() {
        let err = build("visitor-search", &json!({"metadata_field": "agent.plan"})).unwrap_err();
        assert!(err.to_string().contains("together"));
    }

    #[test]
    fn test_metadata_field_is_not_injectable() {
        let err = build(
            "account-search",
            &json!({"metadata_field": "plan\" || true", "metadata_value": "x"}),
        )
        .unwrap_err();
        assert!(matches!(err, IntentError::InvalidParameters(_)));
    }

    #[test]
    fn test_most_active_ranks_descending_with_key_tiebreak() {
        let pipeline = build("most-active", &json!({"entity": "accounts"})).unwrap();
        let wire = pipeline.to_wire();
        assert_eq!(wire[1]["group"]["group"], json!(["accountId"]));
        assert!(wire[1]["group"]["fields"]["uniqueVisitors"].is_object());
        assert_eq!(wire[2]["sort"], json!(["-totalEvents", "accountId"]));
        assert_eq!(wire[3]["limit"], 10);
    }

    #[test]
    fn test_feature_adoption_targets_one_feature() {
        let pipeline = build("feature-adoption", &json!({"feature_id": "feat-1"})).unwrap();
        let wire = pipeline.to_wire();
        assert_eq!(wire[0]["source"]["featureEvents"]["featureId"], "feat-1");
        assert_eq!(wire[1]["reduce"]["uniqueVisitors"], json!({"count": "visitorId"}));
        assert_eq!(wire[1]["reduce"]["totalEvents"], json!({"sum": "numEvents"}));
    }

    #[test]
    fn test_funnel_step_kinds() {
        for (kind, key) in [
            ("page", "pageEvents"),
            ("feature", "featureEvents"),
            ("track", "trackEvents"),
        ] {
            let pipeline = build("funnel-step", &json!({"kind": kind, "id": "x"})).unwrap();
            assert!(pipeline.to_wire()[0]["source"][key].is_object());
        }
        assert!(build("funnel-step", &json!({"kind": "guide", "id": "x"})).is_err());
    }

    #[test]
    fn test_path_analysis_days_back_bound() {
        assert!(build("path-analysis", &json!({"days_back": 30})).is_ok());
        assert!(build("path-analysis", &json!({"days_back": 31})).is_err());
        let wire = build("path-analysis", &json!({})).unwrap().to_wire();
        assert_eq!(wire[2]["sort"], json!(["visitorId", "day"]));
        assert_eq!(wire[3]["limit"], PATH_ROW_LIMIT);
    }

    #[test]
    fn test_retention_week_is_anchored() {
        let wire = build("retention-cohort", &json!({"weeks_ago": 3}))
            .unwrap()
            .to_wire();
        let window = &wire[0]["source"]["timeSeries"];
        assert_eq!(window["period"], "weekRange");
        assert_eq!(window["count"], -1);
        assert_eq!(window["first"], "dateAdd(now(), -3, \"weeks\")");
    }

    #[test]
    fn test_stickiness_requires_shorter_numerator() {
        assert!(build("stickiness", &json!({})).is_ok());
        let err = build(
            "stickiness",
            &json!({"numerator": "weekly", "denominator": "weekly"}),
        )
        .unwrap_err();
        assert!(matches!(err, IntentError::InvalidParameters(_)));
    }

    #[test]
    fn test_nps_breakdown_group_keys() {
        let flat = build("nps-breakdown", &json!({"guide_id": "g", "poll_id": "p"}))
            .unwrap()
            .to_wire();
        assert_eq!(flat[1]["group"]["group"], json!(["pollResponse"]));

        let weekly = build(
            "nps-breakdown",
            &json!({"guide_id": "g", "poll_id": "p", "group_by": "week"}),
        )
        .unwrap()
        .to_wire();
        assert_eq!(weekly[1]["group"]["group"], json!(["week", "pollResponse"]));
        assert_eq!(weekly[2]["sort"], json!(["week", "pollResponse"]));
        assert_eq!(weekly[0]["source"]["pollsSeen"]["guideId"], "g");
    }

    #[test]
    fn test_nps_membership_needs_an_identifier() {
        let err = build("nps-membership", &json!({"guide_id": "g", "poll_id": "p"})).unwrap_err();
        assert!(err.to_string().contains("visitor_id or account_id"));

        let wire = build(
            "nps-membership",
            &json!({"guide_id": "g", "poll_id": "p", "visitor_id": "v", "account_id": "a"}),
        )
        .unwrap()
        .to_wire();
        assert_eq!(wire[1]["filter"], "visitorId == \"v\" || accountId == \"a\"");
    }

    #[test]
    fn test_usage_analysis_chain_keeps_account_filter() {
        let chain = plan_chain("usage-analysis", &json!({"account_id": "acme"})).unwrap();
        let intents: Vec<_> = chain.queries().map(|q| q.intent).collect();
        assert_eq!(
            intents,
            vec![
                "usage-analysis",
                "broad-feature-usage",
                "page-activity-overview",
                "basic-visitor-activity"
            ]
        );
        for query in chain.queries() {
            assert_eq!(query.pipeline.to_wire()[1]["filter"], "accountId == \"acme\"");
        }
    }

    #[test]
    fn test_unknown_intent() {
        assert_eq!(
            build("nope", &json!({})).unwrap_err(),
            IntentError::UnknownIntent("nope".to_string())
        );
    }
}
