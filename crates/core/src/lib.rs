//! Pendo Insights Core - Aggregation pipeline model.
//!
//! This crate provides the types shared by every Pendo Insights component:
//! - `pendo-insights` - Query builder, executor, fallback chain and metrics
//! - `cli` - Command-line boundary for listing and invoking tools
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. A pipeline is built here, serialized here, and its results are
//! represented here; sending it somewhere is someone else's job.
//!
//! # Modules
//!
//! - [`types`] - Entity ids, time windows, filter expressions, pipeline stages,
//!   pipelines, result rows and query outcomes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
