//! Ordered, validated pipelines and the request envelope they travel in.

use serde_json::{Value, json};

use super::stage::{PipelineStage, Source, StageKind, ValidationError};

/// An ordered list of stages that starts with exactly one `source`.
///
/// Construction fails when:
/// - any stage fails [`PipelineStage::validate`];
/// - the pipeline is empty or does not start with a `source` stage;
/// - a second `source` stage appears;
/// - an aggregating stage follows a `sort` or `limit`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    name: String,
    stages: Vec<PipelineStage>,
}

impl Pipeline {
    /// Validate and assemble a pipeline.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` naming the first offending stage.
    pub fn new(name: impl Into<String>, stages: Vec<PipelineStage>) -> Result<Self, ValidationError> {
        for stage in &stages {
            stage.validate()?;
        }
        let Some(first) = stages.first() else {
            return Err(ValidationError::new(
                StageKind::Source,
                "pipeline must contain at least one stage",
            ));
        };
        if first.kind() != StageKind::Source {
            return Err(ValidationError::new(
                first.kind(),
                "pipeline must start with a source stage",
            ));
        }

        let mut ordered_after: Option<StageKind> = None;
        for stage in stages.iter().skip(1) {
            let kind = stage.kind();
            if kind == StageKind::Source {
                return Err(ValidationError::new(
                    kind,
                    "pipeline may contain only one source stage",
                ));
            }
            if let Some(previous) = ordered_after
                && kind.is_aggregating()
            {
                return Err(ValidationError::new(
                    kind,
                    format!("{kind} cannot follow a {previous} stage"),
                ));
            }
            if matches!(kind, StageKind::Sort | StageKind::Limit) && ordered_after.is_none() {
                ordered_after = Some(kind);
            }
        }

        Ok(Self {
            name: name.into(),
            stages,
        })
    }

    /// Request name reported to the remote service.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    /// The leading `source` stage.
    #[must_use]
    pub fn source(&self) -> Option<&Source> {
        self.stages.first().and_then(PipelineStage::as_source)
    }

    /// Stage kinds in order, handy for assertions and logging.
    #[must_use]
    pub fn kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(PipelineStage::kind).collect()
    }

    /// The stage list in wire form.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        Value::Array(self.stages.iter().map(PipelineStage::to_wire).collect())
    }
}

/// Body of `POST /api/v1/aggregation`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationRequest {
    pipeline: Pipeline,
}

impl AggregationRequest {
    #[must_use]
    pub const fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    #[must_use]
    pub const fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Full request body including the response envelope.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        json!({
            "response": { "mimeType": "application/json" },
            "request": {
                "name": self.pipeline.name(),
                "pipeline": self.pipeline.to_wire(),
            },
        })
    }
}

impl From<Pipeline> for AggregationRequest {
    fn from(pipeline: Pipeline) -> Self {
        Self::new(pipeline)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::stage::{Aggregate, SortKey, SourceEntity};
    use crate::types::window::{Period, TimeWindow};

    fn source() -> PipelineStage {
        PipelineStage::source(
            SourceEntity::Events,
            Some(TimeWindow::last(Period::Day, 7).unwrap()),
        )
        .unwrap()
    }

    fn group() -> PipelineStage {
        PipelineStage::group(
            &["day"],
            vec![("uniqueVisitors".into(), Aggregate::count("visitorId"))],
        )
        .unwrap()
    }

    #[test]
    fn test_valid_pipeline() {
        let pipeline = Pipeline::new(
            "active-visitors",
            vec![
                source(),
                group(),
                PipelineStage::sort(vec![SortKey::asc("day")]).unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(
            pipeline.kinds(),
            vec![StageKind::Source, StageKind::Group, StageKind::Sort]
        );
        assert_eq!(pipeline.source().unwrap().window().unwrap().count(), -7);
    }

    #[test]
    fn test_empty_pipeline_rejected() {
        assert!(Pipeline::new("x", vec![]).is_err());
    }

    #[test]
    fn test_first_stage_must_be_source() {
        let err = Pipeline::new("x", vec![group()]).unwrap_err();
        assert_eq!(err.stage, StageKind::Group);
    }

    #[test]
    fn test_second_source_rejected() {
        let err = Pipeline::new("x", vec![source(), source()]).unwrap_err();
        assert_eq!(err.stage, StageKind::Source);
        assert!(err.reason.contains("only one"));
    }

    #[test]
    fn test_aggregation_after_limit_rejected() {
        let err = Pipeline::new(
            "x",
            vec![source(), PipelineStage::limit(10).unwrap(), group()],
        )
        .unwrap_err();
        assert_eq!(err.stage, StageKind::Group);

        let err = Pipeline::new(
            "x",
            vec![
                source(),
                PipelineStage::sort(vec![SortKey::asc("day")]).unwrap(),
                PipelineStage::pes(),
            ],
        )
        .unwrap_err();
        assert_eq!(err.stage, StageKind::Pes);
    }

    #[test]
    fn test_unvalidated_stage_contents_rejected() {
        let err = Pipeline::new("x", vec![source(), PipelineStage::Limit(0)]).unwrap_err();
        assert_eq!(err.stage, StageKind::Limit);

        let err = Pipeline::new("x", vec![source(), PipelineStage::Sort(vec![])]).unwrap_err();
        assert_eq!(err.stage, StageKind::Sort);
    }

    #[test]
    fn test_filter_after_sort_allowed() {
        let pipeline = Pipeline::new(
            "x",
            vec![
                source(),
                group(),
                PipelineStage::sort(vec![SortKey::desc("uniqueVisitors")]).unwrap(),
                PipelineStage::limit(5).unwrap(),
            ],
        );
        assert!(pipeline.is_ok());
    }

    #[test]
    fn test_request_envelope() {
        let pipeline = Pipeline::new("active-visitors", vec![source()]).unwrap();
        let body = AggregationRequest::from(pipeline).to_wire();
        assert_eq!(
            body,
            json!({
                "response": {"mimeType": "application/json"},
                "request": {
                    "name": "active-visitors",
                    "pipeline": [{"source": {
                        "events": null,
                        "timeSeries": {"period": "dayRange", "first": "now()", "count": -7}
                    }}]
                }
            })
        );
    }
}
