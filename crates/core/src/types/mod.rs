//! Core types for Pendo Insights.
//!
//! This module provides type-safe wrappers for the aggregation pipeline
//! grammar and the rows it returns.

pub mod expr;
pub mod id;
pub mod outcome;
pub mod pipeline;
pub mod row;
pub mod stage;
pub mod window;

pub use expr::{CompareOp, Expr, FieldPath, FieldPathError, Literal, ValueExpr};
pub use id::*;
pub use outcome::{QueryOutcome, TransportErrorKind};
pub use pipeline::{AggregationRequest, Pipeline};
pub use row::ResultRow;
pub use stage::{
    AggOp, Aggregate, Group, PipelineStage, Reduce, SortKey, SortOrder, Source, SourceEntity,
    StageKind, StickinessPeriod, ValidationError,
};
pub use window::{Anchor, Period, TimeWindow};
