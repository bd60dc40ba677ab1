//! `pendo-cli call <tool>`

use pendo_insights::tools::get_tool_by_name;
use pendo_insights::{InsightsConfig, PendoClient, ToolError, ToolExecutor};

use super::{CliError, emit, parse_input};

/// Run one tool and print its text blob.
///
/// Tool failures are part of the text; only an unknown tool, bad input or a
/// client that cannot be built end the process with an error.
pub async fn run(config: &InsightsConfig, tool: &str, raw_input: &str) -> Result<(), CliError> {
    if get_tool_by_name(tool).is_none() {
        return Err(ToolError::UnknownTool(tool.to_string()).into());
    }
    let input = parse_input(raw_input)?;

    let client = PendoClient::new(config.pendo())?;
    let executor = ToolExecutor::new(&client).with_fanout_limit(config.fanout_limit);
    tracing::info!(tool, "Running tool");

    let text = executor.execute_to_text(tool, &input).await;
    emit(&text)
}
