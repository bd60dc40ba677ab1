//! Query intents: named, parameterized pipeline templates.
//!
//! Each [`QueryIntent`] owns its parameter schema and a template function.
//! Building an intent validates raw JSON input against the schema first, so
//! a bad parameter is reported before anything touches the network.

mod catalog;
mod params;

pub use catalog::{INTENTS, PATH_ROW_LIMIT, funnel_step_schema};
pub use params::{ParamKind, ParamSpec, Params, object_schema};

use pendo_insights_core::{Pipeline, PipelineStage, ValidationError};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::query::{FallbackChain, PlannedQuery};

/// Errors raised while turning caller input into a pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntentError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Unknown intent: {0}")]
    UnknownIntent(String),
}

impl From<ValidationError> for IntentError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidParameters(err.to_string())
    }
}

/// Template function: validated parameters in, ordered stages out.
pub type StageTemplate = fn(&Params) -> Result<Vec<PipelineStage>, IntentError>;

/// Immutable descriptor of one intent.
#[derive(Debug, Clone, Copy)]
pub struct QueryIntent {
    /// Stable identifier, e.g. `usage-over-time`.
    pub name: &'static str,
    /// Human label sent as the request name.
    pub label: &'static str,
    pub params: &'static [ParamSpec],
    /// Intents tried in order when this one yields no usable rows. They are
    /// built from the same input.
    pub fallbacks: &'static [&'static str],
    template: StageTemplate,
}

impl QueryIntent {
    pub(crate) const fn new(
        name: &'static str,
        label: &'static str,
        params: &'static [ParamSpec],
        template: StageTemplate,
    ) -> Self {
        Self {
            name,
            label,
            params,
            fallbacks: &[],
            template,
        }
    }

    pub(crate) const fn with_fallbacks(mut self, fallbacks: &'static [&'static str]) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    /// JSON Schema of this intent's parameters.
    #[must_use]
    pub fn schema(&self) -> Value {
        object_schema(self.params)
    }

    /// Validate raw input against this intent's schema.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameters` for any schema violation.
    pub fn validate(&self, input: &Value) -> Result<Params, IntentError> {
        Params::validate(self.params, input)
    }

    /// Fill the template from already validated parameters.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameters` if the template or the assembled pipeline
    /// rejects the parameters.
    pub fn build(&self, params: &Params) -> Result<Pipeline, IntentError> {
        let stages = (self.template)(params)?;
        let pipeline = Pipeline::new(self.label, stages)?;
        debug!(intent = self.name, stages = ?pipeline.kinds(), "Built pipeline");
        Ok(pipeline)
    }

    /// Validate and build in one step.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameters` on bad input.
    pub fn plan(&self, input: &Value) -> Result<PlannedQuery, IntentError> {
        let params = self.validate(input)?;
        Ok(PlannedQuery::new(self.name, self.build(&params)?))
    }
}

/// Look up an intent by name.
#[must_use]
pub fn find(name: &str) -> Option<&'static QueryIntent> {
    INTENTS.iter().find(|intent| intent.name == name)
}

/// Look up an intent by name, failing on unknown names.
///
/// # Errors
///
/// Returns `UnknownIntent` if no intent has that name.
pub fn intent(name: &str) -> Result<&'static QueryIntent, IntentError> {
    find(name).ok_or_else(|| IntentError::UnknownIntent(name.to_string()))
}

/// Build the pipeline for `name` from raw input.
///
/// # Errors
///
/// Returns `UnknownIntent` or `InvalidParameters`.
pub fn build(name: &str, input: &Value) -> Result<Pipeline, IntentError> {
    let intent = intent(name)?;
    intent.build(&intent.validate(input)?)
}

/// Validate and build `name`, tagging the pipeline with the intent.
///
/// # Errors
///
/// Returns `UnknownIntent` or `InvalidParameters`.
pub fn plan(name: &str, input: &Value) -> Result<PlannedQuery, IntentError> {
    intent(name)?.plan(input)
}

/// Build the primary pipeline and every declared fallback from one input.
///
/// # Errors
///
/// Returns `UnknownIntent` or `InvalidParameters` if any tier cannot be built.
pub fn plan_chain(name: &str, input: &Value) -> Result<FallbackChain, IntentError> {
    let primary = intent(name)?;
    let params = primary.validate(input)?;
    let first = PlannedQuery::new(primary.name, primary.build(&params)?);

    let fallbacks = primary
        .fallbacks
        .iter()
        .map(|fallback| {
            let fallback = intent(fallback)?;
            let params = fallback.validate(input)?;
            Ok(PlannedQuery::new(fallback.name, fallback.build(&params)?))
        })
        .collect::<Result<Vec<_>, IntentError>>()?;

    Ok(FallbackChain::new(first, fallbacks))
}
