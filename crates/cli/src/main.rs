//! Pendo Insights CLI - tool catalog, pipeline dry runs and tool calls.
//!
//! # Usage
//!
//! ```bash
//! # List every tool definition as JSON
//! pendo-cli tools
//!
//! # Print the aggregation request(s) a tool would send, without calling Pendo
//! pendo-cli pipeline analyze_usage --input '{"days_back": 14}'
//!
//! # Run a tool and print its text result
//! pendo-cli call get_active_visitors --input '{"days_back": 7, "group_by": "hour"}'
//! ```
//!
//! Tool output goes to stdout. Logs go to stderr, filtered by `RUST_LOG`.
//!
//! # Commands
//!
//! - `tools` - Print tool definitions
//! - `pipeline` - Dry-run pipeline construction
//! - `call` - Execute a tool (requires `PENDO_INTEGRATION_KEY`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pendo_insights::{InsightsConfig, LogFormat};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "pendo-cli")]
#[command(author, version, about = "Pendo Insights CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every tool definition as JSON
    Tools {
        /// Only tools in this domain (`entities` or `analytics`)
        #[arg(short, long)]
        domain: Option<String>,
    },
    /// Print the aggregation requests a tool would send, without sending them
    Pipeline {
        /// Tool name
        tool: String,

        /// Tool input as a JSON object
        #[arg(short, long, default_value = "{}")]
        input: String,

        /// Maximum per-item queries
        #[arg(long, default_value_t = pendo_insights::config::DEFAULT_FANOUT_LIMIT)]
        fanout_limit: usize,
    },
    /// Run a tool against Pendo and print its text result
    Call {
        /// Tool name
        tool: String,

        /// Tool input as a JSON object
        #[arg(short, long, default_value = "{}")]
        input: String,
    },
}

impl Commands {
    const fn needs_config(&self) -> bool {
        matches!(self, Self::Call { .. })
    }
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &InsightsConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            attach_stacktrace: true,
            send_default_pii: false,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Install the tracing subscriber. Everything is written to stderr.
fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pendo_insights=info,pendo_cli=info".into());

    let json = format == LogFormat::Json;
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = if cli.command.needs_config() {
        match InsightsConfig::from_env() {
            Ok(config) => Some(config),
            Err(e) => {
                init_tracing(LogFormat::Text);
                tracing::error!("Configuration error: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        None
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = config.as_ref().and_then(init_sentry);
    init_tracing(config.as_ref().map_or(LogFormat::Text, |c| c.log_format));

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: Option<InsightsConfig>) -> Result<(), CliError> {
    match command {
        Commands::Tools { domain } => commands::tools::list(domain.as_deref()),
        Commands::Pipeline {
            tool,
            input,
            fanout_limit,
        } => commands::pipeline::dry_run(&tool, &input, fanout_limit),
        Commands::Call { tool, input } => {
            let config = config.ok_or(CliError::MissingConfig)?;
            commands::call::run(&config, &tool, &input).await
        }
    }
}
