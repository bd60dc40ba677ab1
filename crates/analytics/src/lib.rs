//! Pendo Insights - aggregation queries and product analytics tools.
//!
//! This crate turns tool calls into Pendo aggregation pipelines, runs them
//! against the Pendo API and derives metrics from the rows that come back.
//!
//! # Layers
//!
//! - [`intents`] - Named query intents, parameter validation and pipeline
//!   templates
//! - [`pendo`] - HTTP client for the aggregation and simple-entity endpoints
//! - [`query`] - Backend seam, per-item fan-out and the fallback chain
//! - [`metrics`] - Pure computations over result rows (funnels, retention,
//!   paths, NPS, stickiness, engagement)
//! - [`tools`] - Tool catalog and the executor that renders text results
//!
//! # Example
//!
//! ```rust,ignore
//! use pendo_insights::{InsightsConfig, PendoClient, ToolExecutor};
//!
//! let config = InsightsConfig::from_env()?;
//! let client = PendoClient::new(&config.pendo)?;
//! let executor = ToolExecutor::new(&client).with_fanout_limit(config.fanout_limit);
//! let text = executor
//!     .execute_to_text("get_active_visitors", &serde_json::json!({"days_back": 7}))
//!     .await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod intents;
pub mod metrics;
pub mod pendo;
pub mod query;
pub mod tools;

pub use config::{InsightsConfig, LogFormat, PendoConfig};
pub use error::ToolError;
pub use pendo::{PendoClient, PendoError};
pub use query::AnalyticsBackend;
pub use tools::{Tool, ToolExecutor, plan_tool};
