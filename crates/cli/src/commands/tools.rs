//! `pendo-cli tools`

use pendo_insights::tools::{all_tools, get_tools_by_domain};

use super::{CliError, emit};

/// Print tool definitions as pretty JSON.
pub fn list(domain: Option<&str>) -> Result<(), CliError> {
    let tools = domain.map_or_else(all_tools, get_tools_by_domain);
    emit(&serde_json::to_string_pretty(&tools)?)
}
