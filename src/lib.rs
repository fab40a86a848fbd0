//! profile-aggregator - Consolidated developer profiles across source-control hosts
//!
//! Given a GitHub username and a Bitbucket username, fetches each account's
//! profile and full repository listing, computes per-provider statistics and
//! merges them into one summary served as JSON.
//!
//! # Architecture
//!
//! - **providers**: Upstream clients, pagination strategies and the per-provider fetchers
//! - **profile**: Per-provider aggregates and their consolidation
//! - **service**: Runs both fetchers for one request under a deadline
//! - **server**: axum HTTP API (`/api/profile`, `/health`, `/metrics`)
//! - **config**: YAML service configuration and validation

// Core modules
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod profile;
pub mod providers;

// Request handling
pub mod server;
pub mod service;

// Re-exports
pub use error::{AggregatorError, Result};
