//! `pendo-cli pipeline <tool>`
//!
//! Prints each aggregation request a tool would send, in the order it would
//! send them. Nothing touches the network.

use pendo_insights::plan_tool;
use serde_json::{Value, json};

use super::{CliError, emit, parse_input};

pub fn dry_run(tool: &str, raw_input: &str, fanout_limit: usize) -> Result<(), CliError> {
    let input = parse_input(raw_input)?;
    let planned = plan_tool(tool, &input, fanout_limit)?;
    tracing::debug!(tool, queries = planned.len(), "Planned tool queries");

    let requests: Vec<Value> = planned
        .iter()
        .map(|query| {
            json!({
                "intent": query.intent,
                "request": query.request().to_wire(),
            })
        })
        .collect();
    emit(&serde_json::to_string_pretty(&requests)?)
}
