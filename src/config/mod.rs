//! Configuration system
//!
//! Loads ~/.config/profile-aggregator/config.yaml with support for:
//! - Server bind address and per-request deadline
//! - Outbound HTTP timeouts, retries and concurrency
//! - Per-provider API roots and page lengths

mod service_config;
pub mod validation;

pub use service_config::{HttpConfig, ProviderConfig, ServerConfig, ServiceConfig};
pub use validation::{validate_config, validate_config_result, ValidationError};
