//! Retry policy for upstream provider requests
//!
//! A failed request is repeated only when [`AggregatorError::is_transient`]
//! says so, up to `http.max_retries` extra attempts. Delays double from
//! `base_delay` and are capped at `max_delay`.

use crate::config::HttpConfig;
use crate::AggregatorError;
use std::time::Duration;

const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(200);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);

/// How often, and how patiently, an upstream request is repeated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    pub fn from_http_config(http: &HttpConfig) -> Self {
        Self::new(http.max_retries)
    }

    /// Every request is attempted exactly once
    pub fn none() -> Self {
        Self::new(0)
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Wait before retry number `retry` (1 for the first retry)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let doublings = retry.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1 << doublings)
            .min(self.max_delay)
    }

    /// Delay before the next attempt, or `None` when `err` should be returned
    ///
    /// `attempts` counts the attempts already made, including the one that
    /// produced `err`.
    pub fn next_delay(&self, attempts: u32, err: &AggregatorError) -> Option<Duration> {
        if attempts > self.max_retries || !err.is_transient() {
            return None;
        }
        Some(self.delay_for(attempts))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_http_config(&HttpConfig::default())
    }
}
