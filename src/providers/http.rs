//! Upstream HTTP client
//!
//! Thin wrapper over `reqwest` that issues GET/HEAD requests against one
//! provider, decodes JSON bodies and attributes every failure to that
//! provider and URL.

use super::retry::RetryPolicy;
use super::Provider;
use crate::config::HttpConfig;
use crate::metrics;
use crate::{AggregatorError, Result};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("profile-aggregator/", env!("CARGO_PKG_VERSION"));

/// HTTP method for an upstream call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
}

/// Decoded upstream response
///
/// `body` is `Value::Null` for empty bodies (HEAD) and for error responses
/// whose body isn't JSON.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl UpstreamResponse {
    /// Turn a non-2xx response into an [`AggregatorError::Upstream`]
    pub fn error_for_status(self, provider: Provider) -> Result<Self> {
        if self.status.is_success() {
            return Ok(self);
        }

        let message = error_message(&self.body)
            .unwrap_or_else(|| self.status.canonical_reason().unwrap_or("error").to_string());

        Err(AggregatorError::Upstream {
            provider,
            url: self.url,
            status: Some(self.status.as_u16()),
            message,
        })
    }
}

/// Pull a human-readable message out of a provider error body.
///
/// GitHub uses `{"message": ...}`, Bitbucket `{"error": {"message": ...}}`.
pub(crate) fn error_message(body: &Value) -> Option<String> {
    body.get("message")
        .or_else(|| body.get("error").and_then(|e| e.get("message")))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// HTTP client bound to one provider
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    provider: Provider,
    retry: RetryPolicy,
}

impl UpstreamClient {
    /// Create a client sending `extra_headers` on top of the JSON content type
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(provider: Provider, http: &HttpConfig, extra_headers: HeaderMap) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.extend(extra_headers);

        let client = Client::builder()
            .timeout(http.request_timeout())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            provider,
            retry: RetryPolicy::from_http_config(http),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Issue one request, retrying transient failures
    ///
    /// Non-2xx responses below 500 are returned as-is so callers can inspect
    /// provider error bodies; use [`UpstreamResponse::error_for_status`] to
    /// reject them.
    pub async fn fetch(&self, url: &str, method: Method) -> Result<UpstreamResponse> {
        let mut attempts = 0;

        loop {
            attempts += 1;
            let err = match self.fetch_once(url, method).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            let Some(delay) = self.retry.next_delay(attempts, &err) else {
                return Err(err);
            };

            warn!(
                provider = %self.provider,
                url = %url,
                attempt = attempts,
                max_retries = self.retry.max_retries(),
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying upstream request"
            );
            sleep(delay).await;
        }
    }

    async fn fetch_once(&self, url: &str, method: Method) -> Result<UpstreamResponse> {
        debug!(provider = %self.provider, url = %url, method = ?method, "Upstream request");

        let request = match method {
            Method::Get => self.client.get(url),
            Method::Head => self.client.head(url),
        };

        let response = request.send().await.map_err(|e| {
            metrics::record_upstream_request(self.provider, "network_error");
            AggregatorError::Upstream {
                provider: self.provider,
                url: url.to_string(),
                status: None,
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        metrics::record_upstream_request(self.provider, status.as_str());

        let headers = response.headers().clone();
        let text = response.text().await.map_err(|e| AggregatorError::Upstream {
            provider: self.provider,
            url: url.to_string(),
            status: Some(status.as_u16()),
            message: format!("failed to read body: {}", e),
        })?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(body) => body,
                Err(e) if status.is_success() => {
                    return Err(AggregatorError::malformed(
                        self.provider,
                        url,
                        format!("invalid JSON: {}", e),
                    ));
                }
                Err(_) => Value::Null,
            }
        };

        if status.is_server_error() {
            return Err(AggregatorError::Upstream {
                provider: self.provider,
                url: url.to_string(),
                status: Some(status.as_u16()),
                message: error_message(&body)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
            });
        }

        Ok(UpstreamResponse {
            url: url.to_string(),
            status,
            headers,
            body,
        })
    }
}
