//! GitHub profile fetcher
//!
//! Uses the REST API with link-header pagination. Every per-repository
//! statistic is read directly off the repository listing, so the only extra
//! request is the starred-repositories count.

use super::http::{Method, UpstreamClient};
use super::pagination::{LinkHeaderPagination, Page, Paginator};
use super::{required_str, ProfileFetcher, Provider};
use crate::config::{HttpConfig, ProviderConfig};
use crate::profile::AggregateBuilder;
use crate::{AggregatorError, Result};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Preview media type that adds `topics` to repository objects
pub const TOPICS_PREVIEW_MEDIA_TYPE: &str = "application/vnd.github.mercy-preview+json";

/// URI template suffix GitHub appends to `starred_url`
const STARRED_TEMPLATE_SUFFIX: &str = "{/owner}{/repo}";

/// Fields read from each repository in a listing
#[derive(Debug, Default, Deserialize)]
struct GitHubRepository {
    #[serde(default)]
    watchers_count: u64,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    open_issues_count: u64,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    topics: Option<Vec<String>>,
}

/// Fetches profile statistics for one GitHub user
#[derive(Debug)]
pub struct GitHubFetcher {
    username: String,
    api_url: String,
    paginator: Paginator,
}

impl GitHubFetcher {
    /// Create a fetcher for `username`
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        username: impl Into<String>,
        config: &ProviderConfig,
        http: &HttpConfig,
    ) -> Result<Self> {
        let client = UpstreamClient::new(Provider::GitHub, http, Self::headers())?;

        Ok(Self {
            username: username.into(),
            api_url: config.base_url().to_string(),
            paginator: Paginator::new(client, LinkHeaderPagination, config.page_len),
        })
    }

    /// Headers sent on every GitHub request, on top of the JSON content type
    pub fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(TOPICS_PREVIEW_MEDIA_TYPE),
        );
        headers
    }

    pub fn profile_url(&self) -> String {
        format!(
            "{}/users/{}",
            self.api_url,
            urlencoding::encode(&self.username)
        )
    }

    /// Repository listing URL advertised by the profile
    pub fn repos_url(&self, profile: &Value) -> Result<String> {
        required_str(Provider::GitHub, &self.profile_url(), profile, "/repos_url")
            .map(str::to_string)
    }

    /// Starred-repositories listing URL with the URI template stripped
    pub fn stars_received_url(&self, profile: &Value) -> Result<String> {
        let starred = required_str(
            Provider::GitHub,
            &self.profile_url(),
            profile,
            "/starred_url",
        )?;
        Ok(starred.replace(STARRED_TEMPLATE_SUFFIX, ""))
    }
}

#[async_trait]
impl ProfileFetcher for GitHubFetcher {
    fn provider(&self) -> Provider {
        Provider::GitHub
    }

    fn username(&self) -> &str {
        &self.username
    }

    async fn fetch_user_profile(&self) -> Result<Value> {
        let url = self.profile_url();
        debug!(username = %self.username, url = %url, "Fetching GitHub profile");

        let response = self
            .paginator
            .client()
            .fetch(&url, Method::Get)
            .await?
            .error_for_status(Provider::GitHub)?;

        if !response.body.is_object() {
            return Err(AggregatorError::malformed(
                Provider::GitHub,
                url,
                "profile is not a JSON object",
            ));
        }

        Ok(response.body)
    }

    async fn fetch_repository_page(&self, url: &str) -> Result<Page> {
        self.paginator.fetch_page(url).await
    }

    async fn fetch_all_repositories(&self, profile: &Value) -> Result<Vec<Value>> {
        let repos_url = self.repos_url(profile)?;
        self.paginator.fetch_all(&repos_url).await
    }

    async fn fetch_extra_totals(
        &self,
        profile: &Value,
        builder: &mut AggregateBuilder,
    ) -> Result<()> {
        let starred_url = self.stars_received_url(profile)?;
        builder.add_stars_received(self.paginator.count(&starred_url).await?);
        Ok(())
    }

    async fn compute_aggregates(
        &self,
        profile: &Value,
        repositories: &[Value],
        builder: &mut AggregateBuilder,
    ) -> Result<()> {
        let followers = profile
            .get("followers")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                AggregatorError::malformed(
                    Provider::GitHub,
                    self.profile_url(),
                    "missing numeric field `followers`",
                )
            })?;
        builder.add_followers(followers);
        builder.add_repositories(repositories.len() as u64);

        for repository in repositories {
            let repo = GitHubRepository::deserialize(repository).map_err(|e| {
                AggregatorError::malformed(
                    Provider::GitHub,
                    self.repos_url(profile).unwrap_or_default(),
                    format!("unexpected repository shape: {}", e),
                )
            })?;

            builder.add_watchers(repo.watchers_count);
            builder.add_stars_given(repo.stargazers_count);
            builder.add_open_issues(repo.open_issues_count);
            builder.add_size(repo.size);
            if let Some(language) = repo.language.as_deref() {
                builder.add_language(language);
            }
            builder.add_topics(repo.topics.unwrap_or_default());
        }

        Ok(())
    }
}
