//! Integration tests for intent templates and the pipelines they build.

#![allow(clippy::indexing_slicing)]

use pendo_insights::intents::{self, INTENTS, IntentError};
use pendo_insights_core::{PipelineStage, StageKind, StickinessPeriod};
use serde_json::{Value, json};

fn first_stage(wire: &Value) -> &Value {
    wire.get(0).expect("pipeline should have stages")
}

// =============================================================================
// Time windows and grouping
// =============================================================================

#[test]
fn test_active_visitors_window_matches_days_back() {
    for days in 1..=90_i64 {
        for (group_by, period) in [("day", "dayRange"), ("hour", "hourRange")] {
            let pipeline = intents::build(
                "active-visitors",
                &json!({"days_back": days, "group_by": group_by}),
            )
            .expect("in-range input should build");
            let wire = pipeline.to_wire();

            let series = &first_stage(&wire)["source"]["timeSeries"];
            assert_eq!(series["period"], period);
            assert_eq!(series["count"], -days);
            assert_eq!(series["first"], "now()");

            let group = wire
                .as_array()
                .and_then(|stages| stages.iter().find(|s| s.get("group").is_some()))
                .expect("pipeline should group");
            assert_eq!(group["group"]["group"], json!([group_by]));
        }
    }
}

#[test]
fn test_out_of_range_days_back_is_rejected() {
    for days in [0, 91, -1] {
        let err = intents::build("active-visitors", &json!({"days_back": days}))
            .expect_err("out-of-range input should fail");
        assert!(matches!(err, IntentError::InvalidParameters(_)));
    }
}

#[test]
fn test_unknown_intent() {
    assert!(matches!(
        intents::build("revenue", &json!({})),
        Err(IntentError::UnknownIntent(_))
    ));
}

// =============================================================================
// Catalog-wide properties
// =============================================================================

#[test]
fn test_every_intent_starts_with_a_source() {
    let minimal = json!({
        "feature_id": "f1",
        "page_id": "p1",
        "account_id": "a1",
        "visitor_id": "v1",
        "metadata_field": "agent.plan",
        "metadata_value": "pro",
        "guide_id": "g1",
        "poll_id": "q1",
        "kind": "page",
        "id": "p1",
    });
    for intent in INTENTS {
        let pipeline = intents::build(intent.name, &minimal)
            .unwrap_or_else(|e| panic!("{} failed to build: {e}", intent.name));
        assert_eq!(pipeline.kinds().first(), Some(&StageKind::Source), "{}", intent.name);
        assert_eq!(pipeline.name(), intent.label);

        let wire = pipeline.to_wire();
        let stages = wire.as_array().expect("wire form should be an array");
        assert_eq!(stages.len(), pipeline.stages().len());
        for stage in stages {
            let object = stage.as_object().expect("each stage should be an object");
            assert_eq!(object.len(), 1, "{}: {stage}", intent.name);
        }
    }
}

#[test]
fn test_usage_analysis_fallbacks_are_real_intents() {
    let chain = intents::plan_chain("usage-analysis", &json!({"account_id": "acme"}))
        .expect("chain should build");
    let names: Vec<&str> = chain.queries().map(|q| q.intent).collect();
    assert_eq!(
        names,
        vec![
            "usage-analysis",
            "broad-feature-usage",
            "page-activity-overview",
            "basic-visitor-activity"
        ]
    );
    for query in chain.queries() {
        let wire = query.pipeline.to_wire().to_string();
        assert!(wire.contains("acme"), "{} dropped the account filter", query.intent);
    }
}

// =============================================================================
// Stage wire keys
// =============================================================================

#[test]
fn test_stage_wire_keys() {
    let stickiness = PipelineStage::stickiness(StickinessPeriod::Daily, StickinessPeriod::Monthly)
        .expect("daily over monthly is valid");
    let cases = [
        (PipelineStage::count(), "count"),
        (PipelineStage::pes(), "pes"),
        (stickiness, "stickiness"),
        (PipelineStage::limit(5).expect("positive limit"), "limit"),
    ];
    for (stage, key) in cases {
        let wire = stage.to_wire();
        assert!(wire.get(key).is_some(), "{key} missing from {wire}");
        assert_eq!(stage.kind().key(), key);
    }
}

#[test]
fn test_stickiness_requires_shorter_numerator() {
    assert!(PipelineStage::stickiness(StickinessPeriod::Monthly, StickinessPeriod::Daily).is_err());
    assert!(PipelineStage::stickiness(StickinessPeriod::Weekly, StickinessPeriod::Weekly).is_err());
}

#[test]
fn test_limit_must_be_positive() {
    assert!(PipelineStage::limit(0).is_err());
    assert!(PipelineStage::limit(-3).is_err());
}
