//! Tool boundary errors.

use thiserror::Error;

use crate::intents::IntentError;
use crate::pendo::PendoError;

/// Errors raised while executing a tool.
///
/// [`ToolExecutor::execute_to_text`](crate::tools::ToolExecutor::execute_to_text)
/// turns every variant into a text blob, so none of these escape the tool
/// boundary.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Pendo request failed: {0}")]
    Upstream(#[from] PendoError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<IntentError> for ToolError {
    fn from(err: IntentError) -> Self {
        match err {
            IntentError::InvalidParameters(reason) => Self::InvalidParameters(reason),
            // Only reachable through a miswired tool.
            IntentError::UnknownIntent(name) => {
                Self::InvalidParameters(format!("no intent named '{name}'"))
            }
        }
    }
}
