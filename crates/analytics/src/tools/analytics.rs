//! Aggregation-backed tools.
//!
//! Each tool validates its input, builds one or more pipelines through the
//! intent catalog, runs them through the fallback orchestrator and renders
//! the derived metrics as text.

use std::collections::HashSet;

use pendo_insights_core::{QueryOutcome, ResultRow};
use serde_json::{Map, Value, json};

use crate::error::ToolError;
use crate::intents::{self, PATH_ROW_LIMIT, Params};
use crate::metrics::{
    EngagementScore, FunnelState, NpsBreakdown, Stickiness, activity, funnel, nps, paths,
    retention,
};
use crate::query::{
    AnalyticsBackend, ChainOutcome, FallbackChain, PlannedQuery, ServedBy, bound_fanout, run_each,
};

use super::definitions::{
    FEATURE_ADOPTION_PARAMS, FUNNEL_PARAMS, PAGE_ACTIVITY_PARAMS, RETENTION_PARAMS,
};
use super::format;
use super::{ToolExecutor, get_tool_by_name};

const WIDEN_WINDOW: &str = "Increase days_back to cover a longer period";
const CHECK_INSTALL: &str = "Check that the Pendo snippet is installed and sending events";
const CHECK_IDS: &str = "Verify the ids with the list_* tools";

// Group keys shown for each usage tier.
const ACCOUNT_FEATURE_KEYS: &[&str] = &["accountId", "featureId"];
const FEATURE_KEYS: &[&str] = &["featureId"];
const PAGE_KEYS: &[&str] = &["pageId"];
const DAY_KEYS: &[&str] = &["day"];

fn count(row: &ResultRow, field: &str) -> i64 {
    row.get_i64(field).unwrap_or(0)
}

fn display(row: &ResultRow, field: &str) -> String {
    row.get_display(field).unwrap_or_else(|| "unknown".to_string())
}

fn prepare(intent: &str, input: &Value) -> Result<(Params, PlannedQuery), ToolError> {
    let intent = intents::intent(intent)?;
    let params = intent.validate(input)?;
    let query = PlannedQuery::new(intent.name, intent.build(&params)?);
    Ok((params, query))
}

fn failure_line(subject: &str, outcome: &QueryOutcome) -> Option<String> {
    match outcome {
        QueryOutcome::TransportError { kind, message } => {
            Some(format!("- {subject}: query failed ({kind}: {message})"))
        }
        _ => None,
    }
}

// =============================================================================
// Plans
// =============================================================================

/// Per-item queries plus the active-visitor base they are measured against.
struct ItemPlan {
    days: i64,
    items: Vec<(String, PlannedQuery)>,
    omitted: Vec<String>,
    base: PlannedQuery,
}

impl ItemPlan {
    fn build(
        input: &Value,
        specs: &[intents::ParamSpec],
        list_param: &str,
        intent: &str,
        id_param: &str,
        fanout_limit: usize,
    ) -> Result<Self, ToolError> {
        let params = Params::validate(specs, input)?;
        let days = params.int("days_back")?;
        let bounded = bound_fanout(params.list(list_param)?.to_vec(), fanout_limit);

        let items = bounded
            .kept
            .into_iter()
            .map(|id| -> Result<_, ToolError> {
                let query = intents::plan(intent, &json!({ id_param: &id, "days_back": days }))?;
                Ok((id, query))
            })
            .collect::<Result<Vec<_>, ToolError>>()?;
        let base = intents::plan("active-base", &json!({ "days_back": days }))?;

        Ok(Self {
            days,
            items,
            omitted: bounded.omitted,
            base,
        })
    }

    /// Execution order: the base first, then each item.
    fn queries(&self) -> Vec<PlannedQuery> {
        std::iter::once(self.base.clone())
            .chain(self.items.iter().map(|(_, q)| q.clone()))
            .collect()
    }
}

struct FunnelPlan {
    days: i64,
    steps: Vec<(String, PlannedQuery)>,
}

impl FunnelPlan {
    fn build(input: &Value, fanout_limit: usize) -> Result<Self, ToolError> {
        let params = Params::validate(FUNNEL_PARAMS, input)?;
        let days = params.int("days_back")?;
        let raw_steps = params.objects("steps")?;
        if raw_steps.len() > fanout_limit {
            return Err(ToolError::InvalidParameters(format!(
                "funnel has {} steps; at most {fanout_limit} are allowed",
                raw_steps.len()
            )));
        }

        let step_intent = intents::intent("funnel-step")?;
        let steps = raw_steps
            .iter()
            .map(|step| -> Result<_, ToolError> {
                let mut step_input: Map<String, Value> = step.clone();
                step_input.insert("days_back".to_string(), json!(days));
                let step_params = step_intent.validate(&Value::Object(step_input))?;
                let label = step
                    .get("label")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map_or_else(
                        || {
                            format!(
                                "{} {}",
                                step_params.text("kind").unwrap_or("event"),
                                step_params.text("id").unwrap_or("?")
                            )
                        },
                        str::to_string,
                    );
                let query = PlannedQuery::new(step_intent.name, step_intent.build(&step_params)?);
                Ok((label, query))
            })
            .collect::<Result<Vec<_>, ToolError>>()?;

        Ok(Self { days, steps })
    }
}

/// Weekly queries, oldest week first.
fn retention_plan(input: &Value) -> Result<Vec<PlannedQuery>, ToolError> {
    let params = Params::validate(RETENTION_PARAMS, input)?;
    let weeks = params.int("weeks")?;
    (0..weeks)
        .rev()
        .map(|weeks_ago| {
            intents::plan("retention-cohort", &json!({ "weeks_ago": weeks_ago }))
                .map_err(ToolError::from)
        })
        .collect()
}

/// Every pipeline `tool` would run, in order.
pub(super) fn plan(
    tool: &str,
    input: &Value,
    fanout_limit: usize,
) -> Result<Vec<PlannedQuery>, ToolError> {
    match tool {
        "get_feature_adoption" => Ok(ItemPlan::build(
            input,
            FEATURE_ADOPTION_PARAMS,
            "feature_ids",
            "feature-adoption",
            "feature_id",
            fanout_limit,
        )?
        .queries()),
        "get_page_activity" => Ok(ItemPlan::build(
            input,
            PAGE_ACTIVITY_PARAMS,
            "page_ids",
            "page-activity",
            "page_id",
            fanout_limit,
        )?
        .queries()),
        "analyze_funnel" => Ok(FunnelPlan::build(input, fanout_limit)?
            .steps
            .into_iter()
            .map(|(_, q)| q)
            .collect()),
        "get_retention_cohort" => retention_plan(input),
        _ => match get_tool_by_name(tool).and_then(|t| t.intent) {
            Some(intent) => {
                let chain = intents::plan_chain(&intent, input)?;
                Ok(chain.queries().cloned().collect())
            }
            None => Ok(Vec::new()),
        },
    }
}

impl<B: AnalyticsBackend> ToolExecutor<'_, B> {
    async fn run_single(&self, query: PlannedQuery) -> ChainOutcome {
        FallbackChain::single(query).run(self.backend).await
    }

    // =========================================================================
    // Activity over time
    // =========================================================================

    pub(super) async fn get_active_visitors(&self, input: &Value) -> Result<String, ToolError> {
        let (params, query) = prepare("active-visitors", input)?;
        let days = params.int("days_back")?;
        let group_by = params.text("group_by")?;

        let rows = match self.run_single(query).await {
            ChainOutcome::Usable { rows, .. } => rows,
            other => {
                return Ok(format::no_data(
                    &format!("active visitors in the last {days} days"),
                    &other,
                    &[WIDEN_WINDOW, CHECK_INSTALL],
                ));
            }
        };

        let summary = activity::summarize(&rows, group_by);
        let hourly = group_by == "hour";
        let mut lines = vec![format!(
            "Active visitors, last {days} days (by {group_by}):"
        )];
        for period in &summary.periods {
            lines.push(format!(
                "- {}: {} visitors, {} events",
                format::period(&period.period, hourly),
                period.unique_visitors,
                period.total_events
            ));
        }
        lines.push(format!("Total events: {}", summary.total_events));
        lines.push(format!("Peak unique visitors: {}", summary.peak_unique_visitors));
        Ok(lines.join("\n"))
    }

    pub(super) async fn get_usage_trend(&self, input: &Value) -> Result<String, ToolError> {
        let (params, query) = prepare("usage-over-time", input)?;
        let days = params.int("days_back")?;
        let group_by = params.text("group_by")?;

        let rows = match self.run_single(query).await {
            ChainOutcome::Usable { rows, .. } => rows,
            other => {
                return Ok(format::no_data(
                    &format!("usage in the last {days} days"),
                    &other,
                    &[WIDEN_WINDOW, CHECK_INSTALL],
                ));
            }
        };

        let mut lines = vec![format!("Usage trend, last {days} days (by {group_by}):")];
        for row in &rows {
            lines.push(format!(
                "- {}: {} visitors, {} accounts, {} events, {} minutes",
                format::period(&display(row, group_by), false),
                count(row, "uniqueVisitors"),
                count(row, "uniqueAccounts"),
                count(row, "totalEvents"),
                count(row, "totalMinutes"),
            ));
        }
        let summary = activity::summarize(&rows, group_by);
        lines.push(format!("Total events: {}", summary.total_events));
        Ok(lines.join("\n"))
    }

    // =========================================================================
    // Searches
    // =========================================================================

    pub(super) async fn search_visitors(&self, input: &Value) -> Result<String, ToolError> {
        let (_, query) = prepare("visitor-search", input)?;
        let rows = match self.run_single(query).await {
            ChainOutcome::Usable { rows, .. } => rows,
            other => {
                return Ok(format::no_data(
                    "visitors matching these filters",
                    &other,
                    &[
                        "Remove a filter or loosen last_seen_days",
                        "Check metadata field names with get_visitor_details",
                    ],
                ));
            }
        };

        let mut lines = vec![format!("Found {} visitors:", rows.len())];
        for row in &rows {
            lines.push(format!(
                "- {} (account: {}, last visit: {})",
                display(row, "visitorId"),
                display(row, "accountId"),
                format::date(row.get_i64("lastVisit")),
            ));
        }
        Ok(lines.join("\n"))
    }

    pub(super) async fn search_accounts_by_metadata(
        &self,
        input: &Value,
    ) -> Result<String, ToolError> {
        let (params, query) = prepare("account-search", input)?;
        let field = params.text("metadata_field")?;
        let value = params.text("metadata_value")?;

        let rows = match self.run_single(query).await {
            ChainOutcome::Usable { rows, .. } => rows,
            other => {
                return Ok(format::no_data(
                    &format!("accounts with {field} = {value}"),
                    &other,
                    &["Check the field name with get_account_details"],
                ));
            }
        };

        let mut lines = vec![format!("Found {} accounts with {field} = {value}:", rows.len())];
        for row in &rows {
            lines.push(format!(
                "- {} (last visit: {})",
                display(row, "accountId"),
                format::date(row.get_i64("lastVisit")),
            ));
        }
        Ok(lines.join("\n"))
    }

    pub(super) async fn list_account_visitors(&self, input: &Value) -> Result<String, ToolError> {
        let (params, query) = prepare("account-visitors", input)?;
        let account = params.text("account_id")?;

        let rows = match self.run_single(query).await {
            ChainOutcome::Usable { rows, .. } => rows,
            other => {
                return Ok(format::no_data(
                    &format!("visitors in account {account}"),
                    &other,
                    &[CHECK_IDS],
                ));
            }
        };

        let mut lines = vec![format!("Visitors in account {account} ({}):", rows.len())];
        for row in &rows {
            lines.push(format!(
                "- {} (last visit: {})",
                display(row, "visitorId"),
                format::date(row.get_i64("lastVisit")),
            ));
        }
        Ok(lines.join("\n"))
    }

    pub(super) async fn search_track_events(&self, input: &Value) -> Result<String, ToolError> {
        let (params, query) = prepare("track-event-search", input)?;
        let days = params.int("days_back")?;

        let rows = match self.run_single(query).await {
            ChainOutcome::Usable { rows, .. } => rows,
            other => {
                return Ok(format::no_data(
                    &format!("track events in the last {days} days"),
                    &other,
                    &[WIDEN_WINDOW, "List track event types with list_track_events"],
                ));
            }
        };

        let mut lines = vec![format!("Track events, last {days} days:")];
        for row in &rows {
            lines.push(format!(
                "- {}: {} events, {} visitors",
                display(row, "trackTypeId"),
                count(row, "totalEvents"),
                count(row, "uniqueVisitors"),
            ));
        }
        Ok(lines.join("\n"))
    }

    pub(super) async fn get_most_active(&self, input: &Value) -> Result<String, ToolError> {
        let (params, query) = prepare("most-active", input)?;
        let days = params.int("days_back")?;
        let entity = params.text("entity")?;
        let accounts = entity == "accounts";
        let key = if accounts { "accountId" } else { "visitorId" };

        let rows = match self.run_single(query).await {
            ChainOutcome::Usable { rows, .. } => rows,
            other => {
                return Ok(format::no_data(
                    &format!("active {entity} in the last {days} days"),
                    &other,
                    &[WIDEN_WINDOW, CHECK_INSTALL],
                ));
            }
        };

        let mut lines = vec![format!("Most active {entity}, last {days} days:")];
        for (rank, row) in rows.iter().enumerate() {
            let mut line = format!(
                "{}. {}: {} events, {} minutes",
                rank + 1,
                display(row, key),
                count(row, "totalEvents"),
                count(row, "totalMinutes"),
            );
            if accounts {
                line.push_str(&format!(", {} visitors", count(row, "uniqueVisitors")));
            }
            lines.push(line);
        }
        Ok(lines.join("\n"))
    }

    // =========================================================================
    // Per-item activity
    // =========================================================================

    pub(super) async fn get_feature_adoption(&self, input: &Value) -> Result<String, ToolError> {
        let plan = ItemPlan::build(
            input,
            FEATURE_ADOPTION_PARAMS,
            "feature_ids",
            "feature-adoption",
            "feature_id",
            self.fanout_limit,
        )?;
        Ok(self.item_activity_report("Feature adoption", plan).await)
    }

    pub(super) async fn get_page_activity(&self, input: &Value) -> Result<String, ToolError> {
        let plan = ItemPlan::build(
            input,
            PAGE_ACTIVITY_PARAMS,
            "page_ids",
            "page-activity",
            "page_id",
            self.fanout_limit,
        )?;
        Ok(self.item_activity_report("Page activity", plan).await)
    }

    async fn item_activity_report(&self, title: &str, plan: ItemPlan) -> String {
        let base_outcome = self.backend.aggregate(&plan.base.request()).await;
        let base = match &base_outcome {
            QueryOutcome::TransportError { .. } => None,
            other => Some(activity::active_base(other.rows())),
        };

        let mut lines = vec![format!(
            "{title}, last {} days (active visitors: {}):",
            plan.days,
            base.map_or_else(|| "unknown".to_string(), |b| b.to_string())
        )];
        lines.extend(failure_line("active base", &base_outcome));
        for (id, outcome) in run_each(self.backend, plan.items).await {
            if let Some(line) = failure_line(&id, &outcome) {
                lines.push(line);
                continue;
            }
            let item = activity::item_activity(id, outcome.rows(), base);
            lines.push(format!(
                "- {}: {} visitors ({}), {} accounts, {} events, {} minutes",
                item.id,
                item.unique_visitors,
                item.adoption_rate.map_or_else(|| "n/a".to_string(), format::pct),
                item.unique_accounts,
                item.total_events,
                item.total_minutes,
            ));
        }
        lines.extend(format::truncation_note(&plan.omitted, self.fanout_limit));
        lines.join("\n")
    }

    // =========================================================================
    // Funnels, paths and retention
    // =========================================================================

    pub(super) async fn analyze_funnel(&self, input: &Value) -> Result<String, ToolError> {
        let plan = FunnelPlan::build(input, self.fanout_limit)?;
        let labels: Vec<String> = plan.steps.iter().map(|(label, _)| label.clone()).collect();

        let mut state = FunnelState::new();
        let mut failures = Vec::new();
        for (label, outcome) in run_each(self.backend, plan.steps).await {
            failures.extend(failure_line(&label, &outcome));
            state.push_rows(outcome.rows());
        }
        let report = state.into_report();

        if report.steps.iter().all(|s| s.visitors == 0) && failures.is_empty() {
            return Ok(format!(
                "No visitors triggered any funnel step in the last {} days.\n\nSuggestions:\n- {WIDEN_WINDOW}\n- {CHECK_IDS}",
                plan.days
            ));
        }

        let mut lines = vec![format!("Funnel analysis, last {} days:", plan.days)];
        for (step, label) in report.steps.iter().zip(&labels) {
            let line = match step.conversion_rate {
                None => format!("Step {}: {label}: {} visitors", step.index + 1, step.visitors),
                Some(rate) => format!(
                    "Step {}: {label}: {} visitors, {} from previous step ({})",
                    step.index + 1,
                    step.visitors,
                    step.converted,
                    format::pct(rate)
                ),
            };
            lines.push(line);
        }
        lines.push(format!(
            "Overall conversion: {}",
            format::pct(report.overall_conversion)
        ));
        if let Some(drop) = report.biggest_drop_off {
            let label = labels.get(drop.index).map_or("?", String::as_str);
            lines.push(format!(
                "Biggest drop-off: step {} ({label}), {} visitors lost",
                drop.index + 1,
                drop.lost
            ));
        }
        if !failures.is_empty() {
            lines.push("Steps with failed queries were counted as empty:".to_string());
            lines.extend(failures);
        }
        Ok(lines.join("\n"))
    }

    pub(super) async fn analyze_paths(&self, input: &Value) -> Result<String, ToolError> {
        let (params, query) = prepare("path-analysis", input)?;
        let days = params.int("days_back")?;
        let max_length = usize::try_from(params.int("max_length")?).unwrap_or(usize::MAX);
        let limit = usize::try_from(params.int("limit")?).unwrap_or(usize::MAX);
        let start_page = params.opt_text("start_page_id");

        let rows = match self.run_single(query).await {
            ChainOutcome::Usable { rows, .. } => rows,
            other => {
                return Ok(format::no_data(
                    &format!("page paths in the last {days} days"),
                    &other,
                    &[WIDEN_WINDOW, "Check that pages are tagged with list_pages"],
                ));
            }
        };

        let capped = i64::try_from(rows.len()).is_ok_and(|n| n >= PATH_ROW_LIMIT);
        let complete: &[ResultRow] = if capped {
            paths::without_last_visitor(&rows)
        } else {
            &rows
        };
        let report = paths::rank_paths(complete, max_length, start_page, limit);
        let cap_note = capped.then(|| {
            format!(
                "Note: the page-event listing hit the {PATH_ROW_LIMIT}-row cap. Later visitors are missing and the last visitor's partial path was left out."
            )
        });
        if report.visitors == 0 {
            let mut text = match start_page {
                Some(page) => format!("No visitor paths start at page {page} in the last {days} days."),
                None => format!("No visitor paths found in the last {days} days."),
            };
            if let Some(note) = cap_note {
                text.push('\n');
                text.push_str(&note);
            }
            return Ok(text);
        }

        let mut lines = vec![format!(
            "Top paths, last {days} days ({} visitors, {} distinct paths):",
            report.visitors, report.distinct_paths
        )];
        for (rank, path) in report.paths.iter().enumerate() {
            lines.push(format!(
                "{}. {}: {} visitors ({})",
                rank + 1,
                path.pages.join(" -> "),
                path.visitors,
                format::pct(path.share)
            ));
        }
        lines.extend(cap_note);
        Ok(lines.join("\n"))
    }

    pub(super) async fn get_retention_cohort(&self, input: &Value) -> Result<String, ToolError> {
        let queries = retention_plan(input)?;
        let weeks = queries.len();
        let keyed: Vec<(usize, PlannedQuery)> = queries.into_iter().enumerate().collect();

        let mut sets: Vec<HashSet<String>> = Vec::with_capacity(weeks);
        let mut failures = Vec::new();
        for (week, outcome) in run_each(self.backend, keyed).await {
            failures.extend(failure_line(&format!("week {week}"), &outcome));
            sets.push(funnel::visitor_set(outcome.rows()));
        }
        let report = retention::retention(&sets);

        if report.cohort_size == 0 {
            let mut text = format!(
                "No visitors were active in the cohort week ({} weeks ago).",
                weeks.saturating_sub(1)
            );
            if !failures.is_empty() {
                text.push('\n');
                text.push_str(&failures.join("\n"));
            }
            return Ok(text);
        }

        let mut lines = vec![format!(
            "Retention cohort: {} visitors active {} weeks ago",
            report.cohort_size,
            weeks.saturating_sub(1)
        )];
        for week in &report.weeks {
            lines.push(format!(
                "Week {}: {} active, {} retained ({})",
                week.week,
                week.active,
                week.retained,
                format::pct(week.retention_rate)
            ));
        }
        if !failures.is_empty() {
            lines.push("Weeks with failed queries were counted as empty:".to_string());
            lines.extend(failures);
        }
        Ok(lines.join("\n"))
    }

    // =========================================================================
    // Engagement
    // =========================================================================

    pub(super) async fn get_stickiness(&self, input: &Value) -> Result<String, ToolError> {
        let (params, query) = prepare("stickiness", input)?;
        let days = params.int("days_back")?;
        let numerator = params.text("numerator")?;
        let denominator = params.text("denominator")?;

        let rows = match self.run_single(query).await {
            ChainOutcome::Usable { rows, .. } => rows,
            other => {
                return Ok(format::no_data(
                    &format!("stickiness in the last {days} days"),
                    &other,
                    &[WIDEN_WINDOW, CHECK_INSTALL],
                ));
            }
        };

        Ok(match Stickiness::from_rows(&rows) {
            Some(stickiness) => format!(
                "Stickiness ({numerator} / {denominator} active), last {days} days: {} ({})",
                format::pct(stickiness.ratio * 100.0),
                stickiness.band.label()
            ),
            None => "Stickiness data was returned without a ratio.".to_string(),
        })
    }

    pub(super) async fn get_product_engagement_score(
        &self,
        input: &Value,
    ) -> Result<String, ToolError> {
        let (params, query) = prepare("engagement-score", input)?;
        let days = params.int("days_back")?;

        let rows = match self.run_single(query).await {
            ChainOutcome::Usable { rows, .. } => rows,
            other => {
                return Ok(format::no_data(
                    &format!("engagement in the last {days} days"),
                    &other,
                    &[WIDEN_WINDOW, CHECK_INSTALL],
                ));
            }
        };

        let Some(pes) = EngagementScore::from_rows(&rows) else {
            return Ok("Engagement data was returned without a score.".to_string());
        };
        let sub = |value: Option<f64>| value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}"));
        Ok([
            format!(
                "Product Engagement Score, last {days} days: {:.1} ({})",
                pes.score,
                pes.band.label()
            ),
            format!("Stickiness: {}", sub(pes.stickiness)),
            format!("Adoption: {}", sub(pes.adoption)),
            format!("Growth: {}", sub(pes.growth)),
        ]
        .join("\n"))
    }

    // =========================================================================
    // NPS
    // =========================================================================

    pub(super) async fn get_nps_breakdown(&self, input: &Value) -> Result<String, ToolError> {
        let (params, query) = prepare("nps-breakdown", input)?;
        let days = params.int("days_back")?;
        let poll = params.text("poll_id")?;
        let group_by = params.text("group_by")?;

        let rows = match self.run_single(query).await {
            ChainOutcome::Usable { rows, .. } => rows,
            other => {
                return Ok(format::no_data(
                    &format!("NPS poll {poll} in the last {days} days"),
                    &other,
                    &[WIDEN_WINDOW, "Check the guide and poll ids"],
                ));
            }
        };

        let overall = NpsBreakdown::from_rows(&rows);
        let total = usize::try_from(overall.total()).unwrap_or(usize::MAX);
        let share =
            |n: u64| format::pct(crate::metrics::percent(usize::try_from(n).unwrap_or(0), total));

        let mut lines = vec![
            format!("NPS for poll {poll}, last {days} days:"),
            format!("Score: {:.1}", overall.score()),
            format!("Responses: {}", overall.total()),
            format!("Promoters (9-10): {} ({})", overall.promoters, share(overall.promoters)),
            format!("Passives (7-8): {} ({})", overall.passives, share(overall.passives)),
            format!(
                "Detractors (0-6): {} ({})",
                overall.detractors,
                share(overall.detractors)
            ),
        ];
        if group_by != "none" {
            lines.push(format!("By {group_by}:"));
            for (bucket, breakdown) in nps::by_bucket(&rows, group_by) {
                lines.push(format!(
                    "- {}: score {:.1} ({} responses)",
                    format::period(&bucket, false),
                    breakdown.score(),
                    breakdown.total()
                ));
            }
        }
        Ok(lines.join("\n"))
    }

    pub(super) async fn check_nps_membership(&self, input: &Value) -> Result<String, ToolError> {
        let (params, query) = prepare("nps-membership", input)?;
        let poll = params.text("poll_id")?;
        let who = match (params.opt_text("visitor_id"), params.opt_text("account_id")) {
            (Some(v), Some(a)) => format!("visitor {v} or account {a}"),
            (Some(v), None) => format!("visitor {v}"),
            (None, Some(a)) => format!("account {a}"),
            (None, None) => "the given ids".to_string(),
        };

        let rows = match self.run_single(query).await {
            ChainOutcome::Usable { rows, .. } => rows,
            other if other.last_failure().is_some() => {
                return Ok(format::no_data(&format!("{who} on poll {poll}"), &other, &[]));
            }
            ChainOutcome::Exhausted { .. } => {
                return Ok(format!("No responses to poll {poll} from {who}."));
            }
        };

        let responses = nps::responses(&rows);
        let mut lines = vec![format!(
            "{} response(s) to poll {poll} from {who}:",
            responses.len()
        )];
        for response in &responses {
            let score = response
                .response
                .map_or_else(|| "no score".to_string(), |r| format!("{r}"));
            let category = response.category.map_or("unscored", |c| c.label());
            lines.push(format!(
                "- visitor {} (account: {}): {score} ({category}) on {}",
                response.visitor_id,
                response.account_id.as_deref().unwrap_or("unknown"),
                format::date(response.browser_time),
            ));
        }
        Ok(lines.join("\n"))
    }

    // =========================================================================
    // Usage with fallbacks
    // =========================================================================

    pub(super) async fn analyze_usage(&self, input: &Value) -> Result<String, ToolError> {
        let params = intents::intent("usage-analysis")?.validate(input)?;
        let days = params.int("days_back")?;
        let scope = params
            .opt_text("account_id")
            .map_or_else(String::new, |a| format!(" for account {a}"));
        let chain = intents::plan_chain("usage-analysis", input)?;

        let (served_by, rows) = match chain.run(self.backend).await {
            ChainOutcome::Usable {
                served_by, rows, ..
            } => (served_by, rows),
            other => {
                return Ok(format::no_data(
                    &format!("usage{scope} in the last {days} days"),
                    &other,
                    &[
                        WIDEN_WINDOW,
                        "Check that features and pages are tagged",
                        "Try get_active_visitors for raw activity",
                    ],
                ));
            }
        };

        let (intent, keys) = match served_by {
            ServedBy::Primary => ("usage-analysis", ACCOUNT_FEATURE_KEYS),
            ServedBy::Fallback { intent, .. } => (
                intent,
                match intent {
                    "broad-feature-usage" => FEATURE_KEYS,
                    "page-activity-overview" => PAGE_KEYS,
                    _ => DAY_KEYS,
                },
            ),
        };
        let label = intents::find(intent).map_or(intent, |i| i.label);

        let mut lines = vec![format!("{label}{scope}, last {days} days:")];
        if served_by.is_fallback() {
            lines.push(
                "(Detailed feature usage by account was unavailable; showing broader data.)"
                    .to_string(),
            );
        }
        for row in &rows {
            let key = keys
                .iter()
                .map(|k| {
                    let value = display(row, k);
                    if *k == "day" {
                        format::period(&value, false)
                    } else {
                        value
                    }
                })
                .collect::<Vec<_>>()
                .join(" / ");
            lines.push(format!(
                "- {key}: {} events, {} visitors",
                count(row, "totalEvents"),
                count(row, "uniqueVisitors"),
            ));
        }
        Ok(lines.join("\n"))
    }
}
