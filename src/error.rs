//! Error types for profile-aggregator
//!
//! Defines the error enum covering every failure mode of a profile request,
//! from missing query parameters to misbehaving upstream providers.
//! Uses thiserror for ergonomic error handling.

use crate::providers::Provider;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for profile-aggregator operations
pub type Result<T> = std::result::Result<T, AggregatorError>;

/// Error type for profile-aggregator operations
#[derive(Error, Debug)]
pub enum AggregatorError {
    /// A required request parameter was not supplied
    #[error("No {0} in request params")]
    MissingParameter(String),

    /// Non-2xx response, error-typed body, or network failure from a provider
    #[error("{provider} request to {url} failed{}: {message}", status_suffix(.status))]
    Upstream {
        provider: Provider,
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// Provider pagination handed back a link that was already visited
    #[error("{provider} pagination did not terminate: {url} was already visited")]
    PaginationLoop { provider: Provider, url: String },

    /// Provider response did not have the expected JSON shape
    #[error("Malformed {provider} response from {url}: {reason}")]
    MalformedResponse {
        provider: Provider,
        url: String,
        reason: String,
    },

    /// The overall request deadline elapsed before both providers finished
    #[error("Profile request exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client errors not tied to a specific provider request
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with HTTP {}", code),
        None => String::new(),
    }
}

impl AggregatorError {
    /// The provider a failure originated from, if any
    pub fn provider(&self) -> Option<Provider> {
        match self {
            AggregatorError::Upstream { provider, .. }
            | AggregatorError::PaginationLoop { provider, .. }
            | AggregatorError::MalformedResponse { provider, .. } => Some(*provider),
            _ => None,
        }
    }

    /// Whether retrying the same request might succeed
    ///
    /// Network failures, timeouts and 5xx responses are transient. Client
    /// errors, including 429, and shape problems are not.
    pub fn is_transient(&self) -> bool {
        match self {
            AggregatorError::Upstream { status: None, .. } => true,
            AggregatorError::Upstream {
                status: Some(status),
                ..
            } => (500..=599).contains(status),
            AggregatorError::Http(e) => {
                e.is_connect()
                    || e.is_timeout()
                    || e.status().is_some_and(|status| status.is_server_error())
            }
            _ => false,
        }
    }

    pub(crate) fn malformed(
        provider: Provider,
        url: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        AggregatorError::MalformedResponse {
            provider,
            url: url.into(),
            reason: reason.into(),
        }
    }
}
