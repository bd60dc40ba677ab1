//! Aggregation pipeline stages.
//!
//! Stages are built through validating constructors on [`PipelineStage`].
//! The enum variants stay public for matching, so `Pipeline::new` re-runs
//! [`PipelineStage::validate`] on every stage it receives.
//! Serialization to the wire format is a total function per stage kind.

use core::fmt;
use std::collections::HashSet;

use serde_json::{Map, Value, json};

use super::expr::{Expr, FieldPath, ValueExpr};
use super::id::{FeatureId, GuideId, PageId, PollId, SegmentId, TrackTypeId};
use super::window::TimeWindow;

/// Stage kinds of the remote pipeline grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Source,
    Filter,
    Segment,
    Group,
    Reduce,
    Eval,
    Sort,
    Limit,
    Select,
    Count,
    Stickiness,
    Pes,
}

impl StageKind {
    /// JSON key of the stage object.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Filter => "filter",
            Self::Segment => "segment",
            Self::Group => "group",
            Self::Reduce => "reduce",
            Self::Eval => "eval",
            Self::Sort => "sort",
            Self::Limit => "limit",
            Self::Select => "select",
            Self::Count => "count",
            Self::Stickiness => "stickiness",
            Self::Pes => "pes",
        }
    }

    /// Stages that collapse rows into aggregates.
    #[must_use]
    pub const fn is_aggregating(self) -> bool {
        matches!(
            self,
            Self::Group | Self::Reduce | Self::Stickiness | Self::Pes
        )
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A stage (or pipeline) failed structural validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {stage} stage: {reason}")]
pub struct ValidationError {
    /// Kind of the offending stage.
    pub stage: StageKind,
    /// Human-readable reason.
    pub reason: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(stage: StageKind, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Source
// =============================================================================

/// Row source of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEntity {
    Visitors,
    Accounts,
    Events,
    /// Page events, optionally for exactly one page.
    PageEvents(Option<PageId>),
    /// Feature events, optionally for exactly one feature.
    FeatureEvents(Option<FeatureId>),
    /// Track events, optionally for exactly one track type.
    TrackEvents(Option<TrackTypeId>),
    /// Poll views and responses for one poll of one guide.
    PollsSeen { guide_id: GuideId, poll_id: PollId },
}

impl SourceEntity {
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Visitors => "visitors",
            Self::Accounts => "accounts",
            Self::Events => "events",
            Self::PageEvents(_) => "pageEvents",
            Self::FeatureEvents(_) => "featureEvents",
            Self::TrackEvents(_) => "trackEvents",
            Self::PollsSeen { .. } => "pollsSeen",
        }
    }

    fn wire_value(&self) -> Value {
        match self {
            Self::Visitors | Self::Accounts | Self::Events => Value::Null,
            Self::PageEvents(id) => id
                .as_ref()
                .map_or(Value::Null, |id| json!({ "pageId": id })),
            Self::FeatureEvents(id) => id
                .as_ref()
                .map_or(Value::Null, |id| json!({ "featureId": id })),
            Self::TrackEvents(id) => id
                .as_ref()
                .map_or(Value::Null, |id| json!({ "trackTypeId": id })),
            Self::PollsSeen { guide_id, poll_id } => {
                json!({ "guideId": guide_id, "pollId": poll_id })
            }
        }
    }

    fn ids(&self) -> Vec<&str> {
        match self {
            Self::Visitors | Self::Accounts | Self::Events => Vec::new(),
            Self::PageEvents(id) => id.iter().map(PageId::as_str).collect(),
            Self::FeatureEvents(id) => id.iter().map(FeatureId::as_str).collect(),
            Self::TrackEvents(id) => id.iter().map(TrackTypeId::as_str).collect(),
            Self::PollsSeen { guide_id, poll_id } => vec![guide_id.as_str(), poll_id.as_str()],
        }
    }
}

/// `source` stage payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    entity: SourceEntity,
    window: Option<TimeWindow>,
}

impl Source {
    #[must_use]
    pub const fn entity(&self) -> &SourceEntity {
        &self.entity
    }

    #[must_use]
    pub const fn window(&self) -> Option<&TimeWindow> {
        self.window.as_ref()
    }

    fn to_wire(&self) -> Value {
        let mut body = Map::new();
        body.insert(self.entity.key().to_string(), self.entity.wire_value());
        if let Some(window) = &self.window {
            body.insert("timeSeries".to_string(), window.to_wire());
        }
        Value::Object(body)
    }
}

// =============================================================================
// Aggregates
// =============================================================================

/// Aggregate operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggOp {
    /// Distinct count of the keyed field.
    Count,
    Sum,
    Min,
    Max,
}

impl AggOp {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

/// An aggregate over one input field, e.g. `{"count": "visitorId"}`.
///
/// The field is validated by the stage that receives the aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    op: AggOp,
    field: String,
}

impl Aggregate {
    #[must_use]
    pub fn new(op: AggOp, field: impl Into<String>) -> Self {
        Self {
            op,
            field: field.into(),
        }
    }

    /// Distinct count keyed on `field`.
    #[must_use]
    pub fn count(field: impl Into<String>) -> Self {
        Self::new(AggOp::Count, field)
    }

    /// Total of `field`.
    #[must_use]
    pub fn sum(field: impl Into<String>) -> Self {
        Self::new(AggOp::Sum, field)
    }

    #[must_use]
    pub const fn op(&self) -> AggOp {
        self.op
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }
}

/// Named, validated aggregate definitions shared by `group` and `reduce`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AggregateFields(Vec<(String, Aggregate)>);

impl AggregateFields {
    fn validate(stage: StageKind, fields: Vec<(String, Aggregate)>) -> Result<Self, ValidationError> {
        if fields.is_empty() {
            return Err(ValidationError::new(
                stage,
                "at least one aggregate field is required",
            ));
        }
        let mut seen = HashSet::new();
        for (name, aggregate) in &fields {
            validate_output_name(stage, name)?;
            if !seen.insert(name.as_str()) {
                return Err(ValidationError::new(
                    stage,
                    format!("duplicate output field '{name}'"),
                ));
            }
            parse_field(stage, aggregate.field())?;
        }
        Ok(Self(fields))
    }

    fn to_wire(&self) -> Value {
        let map = self
            .0
            .iter()
            .map(|(name, aggregate)| {
                (
                    name.clone(),
                    json!({ aggregate.op().key(): aggregate.field() }),
                )
            })
            .collect::<Map<_, _>>();
        Value::Object(map)
    }
}

/// `group` stage payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    keys: Vec<FieldPath>,
    fields: AggregateFields,
}

impl Group {
    #[must_use]
    pub fn keys(&self) -> &[FieldPath] {
        &self.keys
    }

    /// Named aggregates in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[(String, Aggregate)] {
        &self.fields.0
    }
}

/// `reduce` stage payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduce {
    fields: AggregateFields,
}

impl Reduce {
    #[must_use]
    pub fn fields(&self) -> &[(String, Aggregate)] {
        &self.fields.0
    }
}

// =============================================================================
// Ordering and projection
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// One sort key. Descending keys render with a leading `-`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    field: String,
    order: SortOrder,
}

impl SortKey {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Ascending,
        }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Descending,
        }
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub const fn order(&self) -> SortOrder {
        self.order
    }

    fn render(&self) -> String {
        match self.order {
            SortOrder::Ascending => self.field.clone(),
            SortOrder::Descending => format!("-{}", self.field),
        }
    }
}

/// Period pairs for the `stickiness` stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StickinessPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl StickinessPeriod {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

// =============================================================================
// Stage
// =============================================================================

/// One stage of an aggregation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStage {
    Source(Source),
    Filter(Expr),
    Segment(SegmentId),
    Group(Group),
    Reduce(Reduce),
    Eval(Vec<(String, ValueExpr)>),
    Sort(Vec<SortKey>),
    Limit(u32),
    Select(Vec<(String, FieldPath)>),
    Count,
    Stickiness {
        numerator: StickinessPeriod,
        denominator: StickinessPeriod,
    },
    Pes,
}

impl PipelineStage {
    /// `source` stage.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if an entity id is empty.
    pub fn source(
        entity: SourceEntity,
        window: Option<TimeWindow>,
    ) -> Result<Self, ValidationError> {
        Self::Source(Source { entity, window }).checked()
    }

    /// `filter` stage.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if the expression contains an empty
    /// conjunction or disjunction.
    pub fn filter(expr: Expr) -> Result<Self, ValidationError> {
        Self::Filter(expr).checked()
    }

    /// `segment` stage.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if the segment id is empty.
    pub fn segment(id: SegmentId) -> Result<Self, ValidationError> {
        Self::Segment(id).checked()
    }

    /// `group` stage.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` unless there is at least one valid group
    /// key and at least one valid, uniquely named aggregate field.
    pub fn group<K: AsRef<str>>(
        keys: &[K],
        fields: Vec<(String, Aggregate)>,
    ) -> Result<Self, ValidationError> {
        if keys.is_empty() {
            return Err(ValidationError::new(
                StageKind::Group,
                "at least one group key is required",
            ));
        }
        let keys = keys
            .iter()
            .map(|k| parse_field(StageKind::Group, k.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let fields = AggregateFields::validate(StageKind::Group, fields)?;
        Ok(Self::Group(Group { keys, fields }))
    }

    /// `reduce` stage.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` unless there is at least one valid,
    /// uniquely named aggregate field.
    pub fn reduce(fields: Vec<(String, Aggregate)>) -> Result<Self, ValidationError> {
        let fields = AggregateFields::validate(StageKind::Reduce, fields)?;
        Ok(Self::Reduce(Reduce { fields }))
    }

    /// `eval` stage.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if no fields are given or a name is invalid.
    pub fn eval(fields: Vec<(String, ValueExpr)>) -> Result<Self, ValidationError> {
        Self::Eval(fields).checked()
    }

    /// `sort` stage.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if no keys are given or a key is invalid.
    pub fn sort(keys: Vec<SortKey>) -> Result<Self, ValidationError> {
        Self::Sort(keys).checked()
    }

    /// `limit` stage.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if `n` is not a positive 32-bit value.
    pub fn limit(n: i64) -> Result<Self, ValidationError> {
        if n < 1 {
            return Err(ValidationError::new(
                StageKind::Limit,
                format!("limit must be positive (got {n})"),
            ));
        }
        let n = u32::try_from(n)
            .map_err(|_| ValidationError::new(StageKind::Limit, "limit is too large"))?;
        Ok(Self::Limit(n))
    }

    /// `select` stage mapping output names to field paths.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if no fields are given or a name or path
    /// is invalid.
    pub fn select<S: AsRef<str>>(fields: &[(S, S)]) -> Result<Self, ValidationError> {
        let fields = fields
            .iter()
            .map(|(name, path)| {
                Ok((
                    name.as_ref().to_string(),
                    parse_field(StageKind::Select, path.as_ref())?,
                ))
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;
        Self::Select(fields).checked()
    }

    /// `count` stage.
    #[must_use]
    pub const fn count() -> Self {
        Self::Count
    }

    /// `stickiness` stage.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` unless the numerator period is shorter
    /// than the denominator period.
    pub fn stickiness(
        numerator: StickinessPeriod,
        denominator: StickinessPeriod,
    ) -> Result<Self, ValidationError> {
        Self::Stickiness {
            numerator,
            denominator,
        }
        .checked()
    }

    /// `pes` stage.
    #[must_use]
    pub const fn pes() -> Self {
        Self::Pes
    }

    #[must_use]
    pub const fn kind(&self) -> StageKind {
        match self {
            Self::Source(_) => StageKind::Source,
            Self::Filter(_) => StageKind::Filter,
            Self::Segment(_) => StageKind::Segment,
            Self::Group(_) => StageKind::Group,
            Self::Reduce(_) => StageKind::Reduce,
            Self::Eval(_) => StageKind::Eval,
            Self::Sort(_) => StageKind::Sort,
            Self::Limit(_) => StageKind::Limit,
            Self::Select(_) => StageKind::Select,
            Self::Count => StageKind::Count,
            Self::Stickiness { .. } => StageKind::Stickiness,
            Self::Pes => StageKind::Pes,
        }
    }

    /// Check the stage contents.
    ///
    /// Variants can be built directly, so [`Pipeline::new`] calls this for
    /// every stage it is given.
    ///
    /// [`Pipeline::new`]: super::pipeline::Pipeline::new
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` describing the first problem found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let kind = self.kind();
        match self {
            Self::Source(source) => {
                if source.entity.ids().iter().any(|id| id.trim().is_empty()) {
                    return Err(ValidationError::new(
                        kind,
                        format!("{} source requires a non-empty id", source.entity.key()),
                    ));
                }
            }
            Self::Filter(expr) => {
                if has_empty_compound(expr) {
                    return Err(ValidationError::new(kind, "empty AND/OR expression"));
                }
            }
            Self::Segment(id) => {
                if id.as_str().trim().is_empty() {
                    return Err(ValidationError::new(kind, "segment id cannot be empty"));
                }
            }
            Self::Eval(fields) => {
                if fields.is_empty() {
                    return Err(ValidationError::new(
                        kind,
                        "at least one derived field is required",
                    ));
                }
                for (name, _) in fields {
                    validate_output_name(kind, name)?;
                }
            }
            Self::Sort(keys) => {
                if keys.is_empty() {
                    return Err(ValidationError::new(
                        kind,
                        "at least one sort key is required",
                    ));
                }
                for key in keys {
                    parse_field(kind, key.field())?;
                }
            }
            Self::Limit(n) => {
                if *n == 0 {
                    return Err(ValidationError::new(kind, "limit must be positive (got 0)"));
                }
            }
            Self::Select(fields) => {
                if fields.is_empty() {
                    return Err(ValidationError::new(kind, "at least one field is required"));
                }
                for (name, _) in fields {
                    validate_output_name(kind, name)?;
                }
            }
            Self::Stickiness {
                numerator,
                denominator,
            } => {
                if numerator >= denominator {
                    return Err(ValidationError::new(
                        kind,
                        format!(
                            "numerator period ({}) must be shorter than denominator period ({})",
                            numerator.key(),
                            denominator.key()
                        ),
                    ));
                }
            }
            // Group and reduce payloads only exist in validated form.
            Self::Group(_) | Self::Reduce(_) | Self::Count | Self::Pes => {}
        }
        Ok(())
    }

    fn checked(self) -> Result<Self, ValidationError> {
        self.validate()?;
        Ok(self)
    }

    /// Wire form: a single-key object keyed by the stage kind.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        let body = match self {
            Self::Source(source) => source.to_wire(),
            Self::Filter(expr) => Value::String(expr.render()),
            Self::Segment(id) => json!({ "id": id }),
            Self::Group(group) => json!({
                "group": group.keys.iter().map(FieldPath::as_str).collect::<Vec<_>>(),
                "fields": group.fields.to_wire(),
            }),
            Self::Reduce(reduce) => reduce.fields.to_wire(),
            Self::Eval(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, expr)| (name.clone(), Value::String(expr.render())))
                    .collect(),
            ),
            Self::Sort(keys) => Value::Array(
                keys.iter()
                    .map(|key| Value::String(key.render()))
                    .collect(),
            ),
            Self::Limit(n) => json!(n),
            Self::Select(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, path)| (name.clone(), Value::String(path.to_string())))
                    .collect(),
            ),
            Self::Count => Value::Null,
            Self::Stickiness {
                numerator,
                denominator,
            } => json!({
                "numerator": numerator.key(),
                "denominator": denominator.key(),
            }),
            Self::Pes => json!({}),
        };
        let mut stage = Map::new();
        stage.insert(self.kind().key().to_string(), body);
        Value::Object(stage)
    }

    #[must_use]
    pub const fn as_source(&self) -> Option<&Source> {
        match self {
            Self::Source(source) => Some(source),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_group(&self) -> Option<&Group> {
        match self {
            Self::Group(group) => Some(group),
            _ => None,
        }
    }
}

fn parse_field(stage: StageKind, field: &str) -> Result<FieldPath, ValidationError> {
    FieldPath::parse(field)
        .map_err(|e| ValidationError::new(stage, format!("field '{field}': {e}")))
}

/// Output names are single path segments.
fn validate_output_name(stage: StageKind, name: &str) -> Result<(), ValidationError> {
    let path = parse_field(stage, name)?;
    if path.as_str().contains('.') {
        return Err(ValidationError::new(
            stage,
            format!("output name '{name}' must not contain '.'"),
        ));
    }
    Ok(())
}

fn has_empty_compound(expr: &Expr) -> bool {
    match expr {
        Expr::And(children) | Expr::Or(children) => {
            children.is_empty() || children.iter().any(has_empty_compound)
        }
        Expr::Not(inner) => has_empty_compound(inner),
        Expr::Compare { .. } | Expr::IsNull(_) => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::types::window::Period;

    fn visitors_per_day() -> PipelineStage {
        PipelineStage::group(
            &["day"],
            vec![
                ("uniqueVisitors".to_string(), Aggregate::count("visitorId")),
                ("totalEvents".to_string(), Aggregate::sum("numEvents")),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_source_wire_with_window() {
        let stage = PipelineStage::source(
            SourceEntity::Events,
            Some(TimeWindow::last(Period::Day, 7).unwrap()),
        )
        .unwrap();
        assert_eq!(
            stage.to_wire(),
            json!({"source": {
                "events": null,
                "timeSeries": {"period": "dayRange", "first": "now()", "count": -7}
            }})
        );
    }

    #[test]
    fn test_per_entity_source_wire() {
        let stage =
            PipelineStage::source(SourceEntity::FeatureEvents(Some("f1".into())), None).unwrap();
        assert_eq!(
            stage.to_wire(),
            json!({"source": {"featureEvents": {"featureId": "f1"}}})
        );

        let stage = PipelineStage::source(
            SourceEntity::PollsSeen {
                guide_id: "g1".into(),
                poll_id: "p1".into(),
            },
            None,
        )
        .unwrap();
        assert_eq!(
            stage.to_wire(),
            json!({"source": {"pollsSeen": {"guideId": "g1", "pollId": "p1"}}})
        );
    }

    #[test]
    fn test_source_rejects_empty_id() {
        let err = PipelineStage::source(SourceEntity::PageEvents(Some(" ".into())), None)
            .unwrap_err();
        assert_eq!(err.stage, StageKind::Source);
    }

    #[test]
    fn test_group_wire() {
        assert_eq!(
            visitors_per_day().to_wire(),
            json!({"group": {
                "group": ["day"],
                "fields": {
                    "uniqueVisitors": {"count": "visitorId"},
                    "totalEvents": {"sum": "numEvents"}
                }
            }})
        );
    }

    #[test]
    fn test_group_requires_keys_and_fields() {
        let err = PipelineStage::group::<&str>(&[], vec![("n".into(), Aggregate::count("x"))])
            .unwrap_err();
        assert_eq!(err.stage, StageKind::Group);
        assert!(err.reason.contains("group key"));

        let err = PipelineStage::group(&["day"], vec![]).unwrap_err();
        assert!(err.reason.contains("aggregate field"));
    }

    #[test]
    fn test_group_rejects_duplicate_and_dotted_names() {
        let err = PipelineStage::group(
            &["day"],
            vec![
                ("n".into(), Aggregate::count("visitorId")),
                ("n".into(), Aggregate::sum("numEvents")),
            ],
        )
        .unwrap_err();
        assert!(err.reason.contains("duplicate"));

        let err = PipelineStage::reduce(vec![("a.b".into(), Aggregate::count("visitorId"))])
            .unwrap_err();
        assert_eq!(err.stage, StageKind::Reduce);
    }

    #[test]
    fn test_limit_rejects_non_positive() {
        assert_eq!(
            PipelineStage::limit(0).unwrap_err().stage,
            StageKind::Limit
        );
        assert!(PipelineStage::limit(-3).is_err());
        assert_eq!(PipelineStage::limit(5).unwrap().to_wire(), json!({"limit": 5}));
    }

    #[test]
    fn test_sort_renders_descending_with_minus() {
        let stage =
            PipelineStage::sort(vec![SortKey::desc("totalEvents"), SortKey::asc("visitorId")])
                .unwrap();
        assert_eq!(
            stage.to_wire(),
            json!({"sort": ["-totalEvents", "visitorId"]})
        );
    }

    #[test]
    fn test_filter_and_segment_wire() {
        let expr = Expr::equals(FieldPath::parse("accountId").unwrap(), "acme");
        let stage = PipelineStage::filter(expr).unwrap();
        assert_eq!(stage.to_wire(), json!({"filter": "accountId == \"acme\""}));

        let stage = PipelineStage::segment("seg-1".into()).unwrap();
        assert_eq!(stage.to_wire(), json!({"segment": {"id": "seg-1"}}));
    }

    #[test]
    fn test_validate_catches_directly_built_variants() {
        assert_eq!(
            PipelineStage::Limit(0).validate().unwrap_err().stage,
            StageKind::Limit
        );
        assert!(PipelineStage::Sort(vec![]).validate().is_err());
        assert!(PipelineStage::Filter(Expr::And(vec![])).validate().is_err());
        assert!(
            PipelineStage::Stickiness {
                numerator: StickinessPeriod::Monthly,
                denominator: StickinessPeriod::Daily,
            }
            .validate()
            .is_err()
        );
        assert!(PipelineStage::Limit(3).validate().is_ok());
    }

    #[test]
    fn test_filter_rejects_empty_compound() {
        let err = PipelineStage::filter(Expr::And(vec![])).unwrap_err();
        assert_eq!(err.stage, StageKind::Filter);
    }

    #[test]
    fn test_select_eval_count_wire() {
        let stage =
            PipelineStage::select(&[("lastVisit", "metadata.auto.lastvisit")]).unwrap();
        assert_eq!(
            stage.to_wire(),
            json!({"select": {"lastVisit": "metadata.auto.lastvisit"}})
        );

        let stage = PipelineStage::eval(vec![(
            "ratio".to_string(),
            ValueExpr::ratio(
                FieldPath::parse("a").unwrap(),
                FieldPath::parse("b").unwrap(),
            ),
        )])
        .unwrap();
        assert_eq!(stage.to_wire(), json!({"eval": {"ratio": "(a / b)"}}));

        assert_eq!(PipelineStage::count().to_wire(), json!({"count": null}));
    }

    #[test]
    fn test_stickiness_requires_shorter_numerator() {
        let stage =
            PipelineStage::stickiness(StickinessPeriod::Daily, StickinessPeriod::Monthly).unwrap();
        assert_eq!(
            stage.to_wire(),
            json!({"stickiness": {"numerator": "daily", "denominator": "monthly"}})
        );

        let err = PipelineStage::stickiness(StickinessPeriod::Weekly, StickinessPeriod::Weekly)
            .unwrap_err();
        assert_eq!(err.stage, StageKind::Stickiness);
        assert!(
            PipelineStage::stickiness(StickinessPeriod::Monthly, StickinessPeriod::Daily).is_err()
        );
    }

    #[test]
    fn test_every_stage_serializes_to_single_key_object() {
        let stages = vec![
            PipelineStage::source(SourceEntity::Visitors, None).unwrap(),
            PipelineStage::filter(Expr::IsNull(FieldPath::parse("x").unwrap())).unwrap(),
            PipelineStage::segment("s".into()).unwrap(),
            visitors_per_day(),
            PipelineStage::reduce(vec![("n".into(), Aggregate::count("visitorId"))]).unwrap(),
            PipelineStage::sort(vec![SortKey::asc("n")]).unwrap(),
            PipelineStage::limit(1).unwrap(),
            PipelineStage::select(&[("id", "visitorId")]).unwrap(),
            PipelineStage::count(),
            PipelineStage::pes(),
        ];
        for stage in stages {
            let wire = stage.to_wire();
            let object = wire.as_object().unwrap();
            assert_eq!(object.len(), 1);
            assert!(object.contains_key(stage.kind().key()));
        }
    }
}
