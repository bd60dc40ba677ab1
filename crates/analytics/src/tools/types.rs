//! Tool descriptors handed to the registration layer.

use serde::{Deserialize, Serialize};

/// A callable, read-only tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Name of the tool.
    pub name: String,
    /// Description of what the tool does and when to use it.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: serde_json::Value,
    /// Domain the tool belongs to (`entities` or `analytics`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Intent whose pipeline backs the tool, if it runs aggregations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
}
