//! Subcommand implementations.

pub mod call;
pub mod pipeline;
pub mod tools;

use std::io::Write;

use pendo_insights::{PendoError, ToolError};
use serde_json::Value;
use thiserror::Error;

/// Errors that end a CLI invocation with a non-zero exit code.
#[derive(Debug, Error)]
pub enum CliError {
    /// `call` was reached without configuration.
    #[error("Configuration is required for this command")]
    MissingConfig,

    /// `--input` was not a JSON object.
    #[error("Invalid --input: {0}")]
    InvalidInput(String),

    /// Tool name or parameters rejected.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Pendo client could not be built.
    #[error("Pendo client error: {0}")]
    Client(#[from] PendoError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse the `--input` argument into a JSON object.
pub fn parse_input(raw: &str) -> Result<Value, CliError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| CliError::InvalidInput(e.to_string()))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(CliError::InvalidInput("expected a JSON object".to_string()))
    }
}

/// Write a result to stdout, followed by a newline.
pub fn emit(text: &str) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}")?;
    stdout.flush()?;
    Ok(())
}
