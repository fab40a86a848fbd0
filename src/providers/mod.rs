//! Upstream providers
//!
//! Fetchers that turn one username on one source-control host into a
//! [`ProfileAggregate`].
//!
//! # Overview
//!
//! Every provider follows the same sequence, expressed by [`ProfileFetcher`]:
//!
//! 1. **Profile**: fetch the user profile (Bitbucket falls back to the team
//!    profile for team accounts)
//! 2. **Repositories**: walk the paginated repository listing
//! 3. **Extra totals**: provider-specific counts from dedicated count requests
//! 4. **Aggregate**: one pass over the repositories
//!
//! # Built-in Providers
//!
//! - **GitHub**: link-header pagination, counts read off each repository
//! - **Bitbucket**: embedded-cursor pagination, watcher and issue counts
//!   fetched per repository

pub mod bitbucket;
pub mod github;
pub mod http;
pub mod pagination;
pub mod retry;

pub use bitbucket::BitbucketFetcher;
pub use github::GitHubFetcher;
pub use http::{Method, UpstreamClient, UpstreamResponse};
pub use pagination::{
    EmbeddedCursorPagination, LinkHeaderPagination, Page, PaginationStrategy, Paginator,
};

use crate::metrics;
use crate::profile::{AggregateBuilder, ProfileAggregate};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Instant;
use tracing::info;

/// Supported source-control hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    GitHub,
    Bitbucket,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GitHub => "github",
            Provider::Bitbucket => "bitbucket",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retrieves and aggregates one provider's data for one username
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    fn provider(&self) -> Provider;

    fn username(&self) -> &str;

    /// Fetch the raw user profile object
    async fn fetch_user_profile(&self) -> Result<Value>;

    /// Fetch one page of a repository listing
    async fn fetch_repository_page(&self, url: &str) -> Result<Page>;

    /// Walk the profile's repository listing to the end, in page order
    async fn fetch_all_repositories(&self, profile: &Value) -> Result<Vec<Value>>;

    /// Totals that come from dedicated count requests rather than repositories
    async fn fetch_extra_totals(&self, profile: &Value, builder: &mut AggregateBuilder)
        -> Result<()>;

    /// Accumulate per-repository statistics
    async fn compute_aggregates(
        &self,
        profile: &Value,
        repositories: &[Value],
        builder: &mut AggregateBuilder,
    ) -> Result<()>;

    /// Run the whole sequence and return the finished aggregate
    ///
    /// Any failure aborts the sequence; no partial aggregate is returned.
    async fn fetch_all(&self) -> Result<ProfileAggregate> {
        let started = Instant::now();
        let provider = self.provider();

        let profile = self.fetch_user_profile().await?;
        let repositories = self.fetch_all_repositories(&profile).await?;

        let mut builder = AggregateBuilder::new(provider, self.username());
        self.fetch_extra_totals(&profile, &mut builder).await?;
        self.compute_aggregates(&profile, &repositories, &mut builder)
            .await?;

        let aggregate = builder.finish(profile, repositories);
        let elapsed = started.elapsed();
        metrics::record_fetch(provider, aggregate.repositories().len(), elapsed);

        info!(
            provider = %provider,
            username = %aggregate.username(),
            repositories = aggregate.repositories().len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Provider fetch complete"
        );

        Ok(aggregate)
    }
}

/// Read a string field, reporting a malformed response when it's missing
pub(crate) fn required_str<'a>(
    provider: Provider,
    url: &str,
    value: &'a Value,
    pointer: &str,
) -> Result<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            crate::AggregatorError::malformed(
                provider,
                url,
                format!("missing string field `{}`", pointer),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_names() {
        assert_eq!(Provider::GitHub.to_string(), "github");
        assert_eq!(Provider::Bitbucket.as_str(), "bitbucket");
        assert_eq!(serde_json::to_value(Provider::GitHub).unwrap(), json!("github"));
    }

    #[test]
    fn test_required_str() {
        let profile = json!({"links": {"repositories": {"href": "https://x/repos"}}});

        assert_eq!(
            required_str(Provider::Bitbucket, "u", &profile, "/links/repositories/href").unwrap(),
            "https://x/repos"
        );
        assert!(required_str(Provider::Bitbucket, "u", &profile, "/links/followers/href").is_err());
    }
}
