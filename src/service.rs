//! Profile request handling
//!
//! Builds one fetcher per provider, runs both to completion under the
//! configured deadline and consolidates the results.

use crate::config::ServiceConfig;
use crate::profile::ConsolidatedProfile;
use crate::providers::{BitbucketFetcher, GitHubFetcher, ProfileFetcher};
use crate::{AggregatorError, Result};
use std::sync::Arc;
use tracing::info;

/// Consolidates GitHub and Bitbucket statistics for a pair of usernames
#[derive(Debug, Clone)]
pub struct ProfileService {
    config: Arc<ServiceConfig>,
}

impl ProfileService {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Fetch both providers and merge them into one profile
    ///
    /// The first failure from either provider aborts the whole request.
    pub async fn consolidated_profile(
        &self,
        github_username: &str,
        bitbucket_username: &str,
    ) -> Result<ConsolidatedProfile> {
        let github = GitHubFetcher::new(github_username, &self.config.github, &self.config.http)?;
        let bitbucket = BitbucketFetcher::new(
            bitbucket_username,
            &self.config.bitbucket,
            &self.config.http,
        )?;

        self.consolidate_with(&github, &bitbucket).await
    }

    /// Run two fetchers concurrently and consolidate their aggregates
    pub async fn consolidate_with(
        &self,
        github: &dyn ProfileFetcher,
        bitbucket: &dyn ProfileFetcher,
    ) -> Result<ConsolidatedProfile> {
        let deadline = self.config.server.request_deadline();

        let (github_aggregate, bitbucket_aggregate) = tokio::time::timeout(deadline, async {
            tokio::try_join!(github.fetch_all(), bitbucket.fetch_all())
        })
        .await
        .map_err(|_| AggregatorError::DeadlineExceeded(deadline))??;

        let profile = ConsolidatedProfile::new(&github_aggregate, &bitbucket_aggregate);
        info!(
            github = %profile.github_username,
            bitbucket = %profile.bitbucket_username,
            repositories = profile.total_repo_count,
            "Consolidated profile"
        );

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::AggregateBuilder;
    use crate::providers::{Page, Provider};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::time::Duration;

    /// Fetcher serving canned repositories without any I/O
    struct FakeFetcher {
        provider: Provider,
        username: String,
        repositories: Vec<Value>,
        fail: bool,
        delay: Option<Duration>,
    }

    impl FakeFetcher {
        fn new(provider: Provider, username: &str, repositories: Vec<Value>) -> Self {
            Self {
                provider,
                username: username.to_string(),
                repositories,
                fail: false,
                delay: None,
            }
        }
    }

    #[async_trait]
    impl ProfileFetcher for FakeFetcher {
        fn provider(&self) -> Provider {
            self.provider
        }

        fn username(&self) -> &str {
            &self.username
        }

        async fn fetch_user_profile(&self) -> Result<Value> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(AggregatorError::Upstream {
                    provider: self.provider,
                    url: "http://fake/profile".to_string(),
                    status: Some(404),
                    message: "Not Found".to_string(),
                });
            }
            Ok(json!({"followers": 5}))
        }

        async fn fetch_repository_page(&self, _url: &str) -> Result<Page> {
            Ok(Page {
                items: self.repositories.clone(),
                next: None,
                total: None,
            })
        }

        async fn fetch_all_repositories(&self, _profile: &Value) -> Result<Vec<Value>> {
            Ok(self.repositories.clone())
        }

        async fn fetch_extra_totals(
            &self,
            profile: &Value,
            builder: &mut AggregateBuilder,
        ) -> Result<()> {
            builder.add_followers(profile["followers"].as_u64().unwrap_or(0));
            Ok(())
        }

        async fn compute_aggregates(
            &self,
            _profile: &Value,
            repositories: &[Value],
            builder: &mut AggregateBuilder,
        ) -> Result<()> {
            builder.add_repositories(repositories.len() as u64);
            for repository in repositories {
                builder.add_size(repository["size"].as_u64().unwrap_or(0));
                if let Some(language) = repository["language"].as_str() {
                    builder.add_language(language);
                }
            }
            Ok(())
        }
    }

    fn service(deadline_secs: u64) -> ProfileService {
        let mut config = ServiceConfig::default();
        config.server.request_deadline_secs = deadline_secs;
        ProfileService::new(config)
    }

    #[tokio::test]
    async fn test_consolidates_both_providers() {
        let github = FakeFetcher::new(
            Provider::GitHub,
            "octo",
            vec![
                json!({"size": 10, "language": "Python"}),
                json!({"size": 5, "language": "C++"}),
            ],
        );
        let bitbucket = FakeFetcher::new(
            Provider::Bitbucket,
            "bucket",
            vec![
                json!({"size": 1, "language": "Python"}),
                json!({"size": 2, "language": "Java"}),
            ],
        );

        let profile = service(60)
            .consolidate_with(&github, &bitbucket)
            .await
            .unwrap();

        assert_eq!(profile.github_username, "octo");
        assert_eq!(profile.bitbucket_username, "bucket");
        assert_eq!(profile.total_repo_count, 4);
        assert_eq!(profile.total_follower_count, 10);
        assert_eq!(profile.total_size, 18);
        assert_eq!(profile.languages_used_count, 3);
    }

    #[tokio::test]
    async fn test_failure_aborts_request() {
        let github = FakeFetcher::new(Provider::GitHub, "octo", vec![]);
        let mut bitbucket = FakeFetcher::new(Provider::Bitbucket, "bucket", vec![]);
        bitbucket.fail = true;

        let result = service(60).consolidate_with(&github, &bitbucket).await;

        match result {
            Err(e) => assert_eq!(e.provider(), Some(Provider::Bitbucket)),
            Ok(profile) => panic!("expected failure, got {:?}", profile),
        }
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let mut github = FakeFetcher::new(Provider::GitHub, "octo", vec![]);
        github.delay = Some(Duration::from_secs(5));
        let bitbucket = FakeFetcher::new(Provider::Bitbucket, "bucket", vec![]);

        let result = service(1).consolidate_with(&github, &bitbucket).await;

        assert!(matches!(result, Err(AggregatorError::DeadlineExceeded(_))));
    }
}
