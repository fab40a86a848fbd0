//! Prometheus metrics for the aggregation service
//!
//! Exposed in text format on `/metrics`.

use crate::providers::Provider;
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::time::Duration;
use tracing::warn;

lazy_static! {
    /// Counter: upstream HTTP requests by provider and outcome (status code or `network_error`)
    pub static ref UPSTREAM_REQUESTS: CounterVec = register_counter_vec!(
        "profile_aggregator_upstream_requests_total",
        "Upstream HTTP requests by provider and outcome",
        &["provider", "outcome"]
    )
    .expect("Failed to create upstream_requests metric");

    /// Histogram: full provider fetch duration (seconds)
    pub static ref FETCH_DURATION: HistogramVec = register_histogram_vec!(
        "profile_aggregator_fetch_duration_seconds",
        "Duration of a complete provider fetch",
        &["provider"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("Failed to create fetch_duration metric");

    /// Counter: repositories retrieved per provider
    pub static ref REPOSITORIES_FETCHED: CounterVec = register_counter_vec!(
        "profile_aggregator_repositories_fetched_total",
        "Repositories retrieved by provider",
        &["provider"]
    )
    .expect("Failed to create repositories_fetched metric");

    /// Counter: profile requests served by response status
    pub static ref PROFILE_REQUESTS: CounterVec = register_counter_vec!(
        "profile_aggregator_profile_requests_total",
        "Profile requests by response status",
        &["status"]
    )
    .expect("Failed to create profile_requests metric");
}

/// Record one upstream request
pub fn record_upstream_request(provider: Provider, outcome: &str) {
    UPSTREAM_REQUESTS
        .with_label_values(&[provider.as_str(), outcome])
        .inc();
}

/// Record a completed provider fetch
pub fn record_fetch(provider: Provider, repositories: usize, elapsed: Duration) {
    FETCH_DURATION
        .with_label_values(&[provider.as_str()])
        .observe(elapsed.as_secs_f64());
    REPOSITORIES_FETCHED
        .with_label_values(&[provider.as_str()])
        .inc_by(repositories as f64);
}

pub fn record_profile_request(status: u16) {
    PROFILE_REQUESTS
        .with_label_values(&[&status.to_string()])
        .inc();
}

/// Encode all metrics as Prometheus text format
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}
