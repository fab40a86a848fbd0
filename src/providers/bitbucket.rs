//! Bitbucket profile fetcher
//!
//! Uses the 2.0 API with embedded-cursor pagination. Watcher and issue
//! totals aren't part of the repository objects, so each repository costs two
//! extra count requests; those run with bounded concurrency.

use super::http::{Method, UpstreamClient, UpstreamResponse};
use super::pagination::{EmbeddedCursorPagination, Page, Paginator};
use super::{required_str, ProfileFetcher, Provider};
use crate::config::{HttpConfig, ProviderConfig};
use crate::profile::AggregateBuilder;
use crate::{AggregatorError, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
}

#[derive(Debug, Default, Deserialize)]
struct RepositoryLinks {
    #[serde(default)]
    watchers: Option<Link>,
    #[serde(default)]
    issues: Option<Link>,
}

/// Fields read from each repository in a listing
#[derive(Debug, Default, Deserialize)]
struct BitbucketRepository {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    links: RepositoryLinks,
}

/// Fetches profile statistics for one Bitbucket user or team
#[derive(Debug)]
pub struct BitbucketFetcher {
    username: String,
    api_url: String,
    paginator: Paginator,
    max_concurrent_requests: usize,
}

impl BitbucketFetcher {
    /// Create a fetcher for `username`
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        username: impl Into<String>,
        config: &ProviderConfig,
        http: &HttpConfig,
    ) -> Result<Self> {
        let client = UpstreamClient::new(Provider::Bitbucket, http, HeaderMap::new())?;

        Ok(Self {
            username: username.into(),
            api_url: config.base_url().to_string(),
            paginator: Paginator::new(client, EmbeddedCursorPagination, config.page_len),
            max_concurrent_requests: http.max_concurrent_requests.max(1),
        })
    }

    pub fn profile_url(&self) -> String {
        format!(
            "{}/2.0/users/{}",
            self.api_url,
            urlencoding::encode(&self.username)
        )
    }

    /// Profile URL used when the username turns out to be a team account
    pub fn teams_url(&self) -> String {
        format!(
            "{}/2.0/teams/{}",
            self.api_url,
            urlencoding::encode(&self.username)
        )
    }

    pub fn repos_url(&self, profile: &Value) -> Result<String> {
        required_str(
            Provider::Bitbucket,
            &self.profile_url(),
            profile,
            "/links/repositories/href",
        )
        .map(str::to_string)
    }

    pub fn followers_url(&self, profile: &Value) -> Result<String> {
        required_str(
            Provider::Bitbucket,
            &self.profile_url(),
            profile,
            "/links/followers/href",
        )
        .map(str::to_string)
    }

    /// Whether a profile response says this username belongs to a team
    fn is_team_account_error(&self, body: &Value) -> bool {
        if body.get("type").and_then(Value::as_str) != Some("error") {
            return false;
        }

        let expected = format!("{} is a team account", self.username).to_lowercase();
        body.pointer("/error/message")
            .and_then(Value::as_str)
            .is_some_and(|message| message.trim().to_lowercase() == expected)
    }

    /// Accept a profile response, rejecting errors and error-typed bodies
    fn profile_from_response(&self, response: UpstreamResponse) -> Result<Value> {
        let response = response.error_for_status(Provider::Bitbucket)?;

        if response.body.get("type").and_then(Value::as_str) == Some("error") {
            return Err(AggregatorError::Upstream {
                provider: Provider::Bitbucket,
                status: Some(response.status.as_u16()),
                message: super::http::error_message(&response.body)
                    .unwrap_or_else(|| "error response".to_string()),
                url: response.url,
            });
        }

        if !response.body.is_object() {
            return Err(AggregatorError::malformed(
                Provider::Bitbucket,
                response.url,
                "profile is not a JSON object",
            ));
        }

        Ok(response.body)
    }

    async fn count_link(&self, link: Option<&Link>) -> Result<u64> {
        match link {
            Some(link) => self.paginator.count(&link.href).await,
            None => Ok(0),
        }
    }

    /// Watcher and issue totals for one repository
    async fn repository_counts(&self, repository: &BitbucketRepository) -> Result<(u64, u64)> {
        if repository.links.issues.is_none() {
            debug!(
                repository = repository.name.as_deref().unwrap_or("<unnamed>"),
                "Repository has no issue tracker"
            );
        }

        let watchers = self.count_link(repository.links.watchers.as_ref()).await?;
        let issues = self.count_link(repository.links.issues.as_ref()).await?;
        Ok((watchers, issues))
    }
}

#[async_trait]
impl ProfileFetcher for BitbucketFetcher {
    fn provider(&self) -> Provider {
        Provider::Bitbucket
    }

    fn username(&self) -> &str {
        &self.username
    }

    async fn fetch_user_profile(&self) -> Result<Value> {
        let client = self.paginator.client();
        let url = self.profile_url();
        debug!(username = %self.username, url = %url, "Fetching Bitbucket profile");

        let response = client.fetch(&url, Method::Get).await?;
        if !self.is_team_account_error(&response.body) {
            return self.profile_from_response(response);
        }

        let teams_url = self.teams_url();
        info!(
            username = %self.username,
            url = %teams_url,
            "Username is a team account, fetching team profile"
        );

        let response = client.fetch(&teams_url, Method::Get).await?;
        self.profile_from_response(response)
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
        let followers_url = self.followers_url(profile)?;
        builder.add_followers(self.paginator.count(&followers_url).await?);
        Ok(())
    }

    async fn compute_aggregates(
        &self,
        profile: &Value,
        repositories: &[Value],
        builder: &mut AggregateBuilder,
    ) -> Result<()> {
        let repositories = repositories
            .iter()
            .map(BitbucketRepository::deserialize)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                AggregatorError::malformed(
                    Provider::Bitbucket,
                    self.repos_url(profile).unwrap_or_default(),
                    format!("unexpected repository shape: {}", e),
                )
            })?;

        builder.add_repositories(repositories.len() as u64);
        for repository in &repositories {
            builder.add_size(repository.size);
            if let Some(language) = repository.language.as_deref() {
                builder.add_language(language);
            }
        }

        let requests: Vec<_> = repositories
            .iter()
            .map(|repository| self.repository_counts(repository))
            .collect();
        let counts: Vec<(u64, u64)> = stream::iter(requests)
            .buffer_unordered(self.max_concurrent_requests)
            .try_collect()
            .await?;

        for (watchers, issues) in counts {
            builder.add_watchers(watchers);
            builder.add_open_issues(issues);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn http_config() -> HttpConfig {
        HttpConfig {
            max_retries: 0,
            ..HttpConfig::default()
        }
    }

    fn fetcher(api_url: &str, page_len: u32) -> BitbucketFetcher {
        let config = ProviderConfig::new(api_url).with_page_len(page_len);
        BitbucketFetcher::new("user1", &config, &http_config()).expect("Failed to create fetcher")
    }

    fn path(path: &str) -> Matcher {
        Matcher::Regex(format!(r"^{}(\?.*)?$", path))
    }

    fn count_body(size: u64) -> String {
        json!({"pagelen": 0, "size": size, "values": [], "page": 1}).to_string()
    }

    #[test]
    fn test_urls() {
        let fetcher = fetcher("https://api.bitbucket.org", 25);
        let profile = json!({
            "links": {
                "repositories": {"href": "/2.0/repositories/user1"},
                "followers": {"href": "/2.0/users/user1/followers"},
            }
        });

        assert_eq!(fetcher.profile_url(), "https://api.bitbucket.org/2.0/users/user1");
        assert_eq!(fetcher.teams_url(), "https://api.bitbucket.org/2.0/teams/user1");
        assert_eq!(fetcher.repos_url(&profile).unwrap(), "/2.0/repositories/user1");
        assert_eq!(fetcher.followers_url(&profile).unwrap(), "/2.0/users/user1/followers");
        assert!(fetcher.repos_url(&json!({})).is_err());
    }

    #[test]
    fn test_team_account_detection() {
        let fetcher = fetcher("https://api.bitbucket.org", 25);

        assert!(fetcher.is_team_account_error(
            &json!({"type": "error", "error": {"message": "user1 is a team account"}})
        ));
        assert!(!fetcher.is_team_account_error(
            &json!({"type": "error", "error": {"message": "user2 is a team account"}})
        ));
        assert!(!fetcher.is_team_account_error(
            &json!({"type": "error", "error": {"message": "Not found"}})
        ));
        assert!(!fetcher.is_team_account_error(&json!({"type": "user"})));
    }

    #[tokio::test]
    async fn test_fetch_user_profile() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/2.0/users/user1")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_body(json!({"profile": "data"}).to_string())
            .create_async()
            .await;

        let profile = fetcher(&server.url(), 25).fetch_user_profile().await.unwrap();

        assert_eq!(profile, json!({"profile": "data"}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_team_profile() {
        let mut server = mockito::Server::new_async().await;
        let user = server
            .mock("GET", "/2.0/users/user1")
            .with_status(200)
            .with_body(
                json!({"type": "error", "error": {"message": "user1 is a team account"}})
                    .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let team = server
            .mock("GET", "/2.0/teams/user1")
            .with_status(200)
            .with_body(json!({"profile": "data"}).to_string())
            .expect(1)
            .create_async()
            .await;

        let profile = fetcher(&server.url(), 25).fetch_user_profile().await.unwrap();

        assert_eq!(profile, json!({"profile": "data"}));
        user.assert_async().await;
        team.assert_async().await;
    }

    #[tokio::test]
    async fn test_team_profile_failure_propagates() {
        let mut server = mockito::Server::new_async().await;
        let user = server
            .mock("GET", "/2.0/users/user1")
            .with_status(404)
            .with_body(
                json!({"type": "error", "error": {"message": "user1 is a team account"}})
                    .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let team = server
            .mock("GET", "/2.0/teams/user1")
            .with_status(404)
            .with_body(
                json!({"type": "error", "error": {"message": "user1 is a team account"}})
                    .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let result = fetcher(&server.url(), 25).fetch_user_profile().await;

        match result {
            Err(AggregatorError::Upstream {
                provider,
                url,
                status,
                ..
            }) => {
                assert_eq!(provider, Provider::Bitbucket);
                assert!(url.ends_with("/2.0/teams/user1"));
                assert_eq!(status, Some(404));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        user.assert_async().await;
        team.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_typed_profile_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/2.0/users/user1")
            .with_status(200)
            .with_body(json!({"type": "error", "error": {"message": "Rate limited"}}).to_string())
            .create_async()
            .await;

        let result = fetcher(&server.url(), 25).fetch_user_profile().await;

        assert!(matches!(
            result,
            Err(AggregatorError::Upstream {
                provider: Provider::Bitbucket,
                status: Some(200),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_fetch_all() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();

        let repository = |name: &str, size: u64, language: &str| {
            json!({
                "name": name,
                "size": size,
                "language": language,
                "links": {
                    "watchers": {
                        "href": format!("{}/2.0/repositories/user1/{}/watchers", base, name)
                    },
                    "issues": {
                        "href": format!("{}/2.0/repositories/user1/{}/issues", base, name)
                    },
                }
            })
        };
        let repo1 = repository("repo1", 1234, "Python");
        let repo2 = repository("repo2", 1234, "Python");
        let repo3 = repository("repo3", 123456, "Java");

        let _profile = server
            .mock("GET", "/2.0/users/user1")
            .with_status(200)
            .with_body(
                json!({
                    "links": {
                        "repositories": {"href": format!("{}/2.0/repositories/user1", base)},
                        "followers": {"href": format!("{}/2.0/users/user1/followers", base)},
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _repos = server
            .mock("GET", path("/2.0/repositories/user1"))
            .match_query(Matcher::Exact("pagelen=25".to_string()))
            .with_status(200)
            .with_body(
                json!({"pagelen": 25, "size": 3, "values": [repo1, repo2, repo3], "page": 1})
                    .to_string(),
            )
            .create_async()
            .await;
        let _followers = server
            .mock("GET", path("/2.0/users/user1/followers"))
            .match_query(Matcher::Exact("pagelen=0".to_string()))
            .with_status(200)
            .with_body(count_body(1234))
            .create_async()
            .await;

        let mut counts = Vec::new();
        for (name, watchers, issues) in [("repo1", 10, 3), ("repo2", 10, 3), ("repo3", 1, 300)] {
            counts.push(
                server
                    .mock("GET", path(&format!("/2.0/repositories/user1/{}/watchers", name)))
                    .match_query(Matcher::Exact("pagelen=0".to_string()))
                    .with_status(200)
                    .with_body(count_body(watchers))
                    .expect(1)
                    .create_async()
                    .await,
            );
            counts.push(
                server
                    .mock("GET", path(&format!("/2.0/repositories/user1/{}/issues", name)))
                    .match_query(Matcher::Exact("pagelen=0".to_string()))
                    .with_status(200)
                    .with_body(count_body(issues))
                    .expect(1)
                    .create_async()
                    .await,
            );
        }

        let aggregate = fetcher(&base, 25).fetch_all().await.unwrap();
        let totals = aggregate.totals();

        assert_eq!(aggregate.repositories(), &[repo1, repo2, repo3]);
        assert_eq!(totals.repo_count, 3);
        assert_eq!(totals.watcher_count, 21);
        assert_eq!(totals.follower_count, 1234);
        assert_eq!(totals.stars_received_count, 0);
        assert_eq!(totals.stars_given_count, 0);
        assert_eq!(totals.open_issues_count, 306);
        assert_eq!(totals.total_size, 125924);
        assert_eq!(
            totals.languages_used.iter().collect::<Vec<_>>(),
            vec!["Java", "Python"]
        );
        assert!(totals.repo_topics.is_empty());
        for mock in counts {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_repository_without_issue_tracker() {
        let mut server = mockito::Server::new_async().await;
        let watchers_url = format!("{}/2.0/repositories/user1/repo1/watchers", server.url());
        let _watchers = server
            .mock("GET", path("/2.0/repositories/user1/repo1/watchers"))
            .with_status(200)
            .with_body(count_body(4))
            .create_async()
            .await;

        let fetcher = fetcher(&server.url(), 25);
        let profile = json!({});
        let repositories = vec![json!({
            "name": "repo1",
            "size": 10,
            "language": "",
            "links": {"watchers": {"href": watchers_url}}
        })];
        let mut builder = AggregateBuilder::new(Provider::Bitbucket, "user1");

        fetcher
            .compute_aggregates(&profile, &repositories, &mut builder)
            .await
            .unwrap();
        let aggregate = builder.finish(profile, repositories);

        assert_eq!(aggregate.totals().watcher_count, 4);
        assert_eq!(aggregate.totals().open_issues_count, 0);
        assert_eq!(aggregate.totals().languages_used_count(), 0);
    }
}
