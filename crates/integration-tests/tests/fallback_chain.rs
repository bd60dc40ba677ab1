//! Integration tests for the fallback orchestrator.

use pendo_insights::intents;
use pendo_insights::query::{AttemptResult, ChainOutcome, ServedBy};
use pendo_insights_core::{QueryOutcome, TransportErrorKind};
use pendo_insights_integration_tests::{FakeBackend, rows};
use serde_json::json;

const PRIMARY: &str = "Usage analysis";
const BROAD: &str = "Broad feature usage";
const PAGES: &str = "Page activity overview";
const BASIC: &str = "Basic visitor activity";

fn chain() -> pendo_insights::query::FallbackChain {
    intents::plan_chain("usage-analysis", &json!({"days_back": 30}))
        .expect("usage chain should build")
}

#[tokio::test]
async fn test_primary_rows_make_one_call() {
    let backend = FakeBackend::new().on(
        PRIMARY,
        rows(vec![json!({"accountId": "a", "featureId": "f", "totalEvents": 3})]),
    );
    let outcome = chain().run(&backend).await;
    assert!(matches!(
        outcome,
        ChainOutcome::Usable {
            served_by: ServedBy::Primary,
            ..
        }
    ));
    assert_eq!(backend.pipeline_names(), vec![PRIMARY]);
}

#[tokio::test]
async fn test_second_fallback_answers_after_three_calls() {
    let backend = FakeBackend::new()
        .on(PRIMARY, QueryOutcome::Empty)
        .on(
            BROAD,
            QueryOutcome::transport_error(TransportErrorKind::ServerError, "HTTP 503"),
        )
        .on(PAGES, rows(vec![json!({"pageId": "home", "totalEvents": 12})]));

    let outcome = chain().run(&backend).await;
    assert_eq!(backend.pipeline_names(), vec![PRIMARY, BROAD, PAGES]);
    match outcome {
        ChainOutcome::Usable {
            served_by, rows, skipped,
        } => {
            assert_eq!(
                served_by,
                ServedBy::Fallback {
                    index: 1,
                    intent: "page-activity-overview"
                }
            );
            assert_eq!(rows.len(), 1);
            assert_eq!(skipped.len(), 2);
            assert!(matches!(
                skipped.get(1).map(|a| &a.result),
                Some(AttemptResult::Failed {
                    kind: TransportErrorKind::ServerError,
                    ..
                })
            ));
        }
        ChainOutcome::Exhausted { .. } => panic!("expected a usable outcome"),
    }
}

#[tokio::test]
async fn test_exhausted_tries_every_tier_once() {
    let backend = FakeBackend::new();
    let outcome = chain().run(&backend).await;
    assert_eq!(backend.pipeline_names(), vec![PRIMARY, BROAD, PAGES, BASIC]);
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
async fn test_rate_limited_tier_is_reported_as_last_failure() {
    let backend = FakeBackend::new().on(
        BASIC,
        QueryOutcome::transport_error(TransportErrorKind::RateLimited, "HTTP 429"),
    );
    let outcome = chain().run(&backend).await;
    assert_eq!(
        outcome.last_failure(),
        Some((TransportErrorKind::RateLimited, "HTTP 429"))
    );
}
