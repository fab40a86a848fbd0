//! Pagination strategies
//!
//! The two providers expose listings differently:
//!
//! - **Link-header** (GitHub): the body is a JSON array and the next page is
//!   announced in the `Link` response header. A listing can be counted by
//!   requesting one item per page and reading the page number of the
//!   `rel="last"` link.
//! - **Embedded-cursor** (Bitbucket): the body is an object holding `values`,
//!   a declared `size`, and an optional `next` URL. A listing can be counted
//!   by requesting zero items per page and reading `size`.
//!
//! [`Paginator`] drives either strategy and refuses to revisit a page.

use super::http::{Method, UpstreamClient, UpstreamResponse};
use super::Provider;
use crate::{AggregatorError, Result};
use async_trait::async_trait;
use reqwest::header::LINK;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;
use url::Url;

/// One page of a listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    /// Full URL of the following page, if the provider announced one
    pub next: Option<String>,
    /// Total number of items the provider says the listing holds
    pub total: Option<u64>,
}

/// Provider-specific way of walking and counting a listing
#[async_trait]
pub trait PaginationStrategy: Send + Sync + std::fmt::Debug {
    /// URL of the first page of `start_url` with `page_len` items per page
    fn page_url(&self, provider: Provider, start_url: &str, page_len: u32) -> Result<String>;

    /// Decode a successful page response
    fn parse_page(&self, provider: Provider, response: &UpstreamResponse) -> Result<Page>;

    /// Number of items in the listing at `start_url`, without listing them
    async fn count(&self, client: &UpstreamClient, start_url: &str) -> Result<u64>;
}

/// Parse a provider-supplied URL, reporting a malformed response on failure
pub fn parse_url(provider: Provider, url: &str) -> Result<Url> {
    Url::parse(url)
        .map_err(|e| AggregatorError::malformed(provider, url, format!("invalid URL: {}", e)))
}

/// Append `key=value` to a URL's query string
pub fn with_query(
    provider: Provider,
    url: &str,
    key: &str,
    value: impl std::fmt::Display,
) -> Result<String> {
    let mut url = parse_url(provider, url)?;
    url.query_pairs_mut().append_pair(key, &value.to_string());
    Ok(url.into())
}

/// Decoded value of the query parameter `name`
pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Parse an RFC 8288 `Link` header into relation → URL
///
/// When a relation appears more than once the first URL wins.
pub fn parse_link_header(value: &str) -> HashMap<String, String> {
    let mut links = HashMap::new();

    for part in value.split(',') {
        let part = part.trim();
        let Some(start) = part.find('<') else {
            continue;
        };
        let Some(len) = part[start..].find('>') else {
            continue;
        };
        let url = &part[start + 1..start + len];

        for param in part[start + len + 1..].split(';') {
            if let Some(rels) = param.trim().strip_prefix("rel=") {
                for rel in rels.trim_matches('"').split_whitespace() {
                    links
                        .entry(rel.to_string())
                        .or_insert_with(|| url.to_string());
                }
            }
        }
    }

    links
}

fn response_links(response: &UpstreamResponse) -> HashMap<String, String> {
    let mut links = HashMap::new();
    for value in response.headers.get_all(LINK) {
        if let Ok(value) = value.to_str() {
            for (rel, url) in parse_link_header(value) {
                links.entry(rel).or_insert(url);
            }
        }
    }
    links
}

/// Link-header pagination (GitHub style)
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkHeaderPagination;

#[async_trait]
impl PaginationStrategy for LinkHeaderPagination {
    fn page_url(&self, provider: Provider, start_url: &str, page_len: u32) -> Result<String> {
        with_query(provider, start_url, "per_page", page_len)
    }

    fn parse_page(&self, provider: Provider, response: &UpstreamResponse) -> Result<Page> {
        let items = response.body.as_array().cloned().ok_or_else(|| {
            AggregatorError::malformed(
                provider,
                &response.url,
                "expected a JSON array of items",
            )
        })?;

        Ok(Page {
            items,
            next: response_links(response).remove("next"),
            total: None,
        })
    }

    async fn count(&self, client: &UpstreamClient, start_url: &str) -> Result<u64> {
        let provider = client.provider();
        let url = self.page_url(provider, start_url, 1)?;
        let response = client
            .fetch(&url, Method::Head)
            .await?
            .error_for_status(provider)?;

        if let Some(last) = response_links(&response).remove("last") {
            let page = query_param(&parse_url(provider, &last)?, "page").ok_or_else(|| {
                AggregatorError::malformed(
                    provider,
                    &url,
                    format!("last link has no page number: {}", last),
                )
            })?;
            return page.parse().map_err(|_| {
                AggregatorError::malformed(
                    provider,
                    &url,
                    format!("last link has a non-numeric page: {}", last),
                )
            });
        }

        // No last link: everything fits on a single one-item page
        let response = client
            .fetch(&url, Method::Get)
            .await?
            .error_for_status(provider)?;
        Ok(self.parse_page(provider, &response)?.items.len() as u64)
    }
}

/// Embedded-cursor pagination (Bitbucket style)
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedCursorPagination;

impl EmbeddedCursorPagination {
    fn declared_size(response: &UpstreamResponse) -> Option<u64> {
        response.body.get("size").and_then(Value::as_u64)
    }
}

#[async_trait]
impl PaginationStrategy for EmbeddedCursorPagination {
    fn page_url(&self, provider: Provider, start_url: &str, page_len: u32) -> Result<String> {
        with_query(provider, start_url, "pagelen", page_len)
    }

    fn parse_page(&self, provider: Provider, response: &UpstreamResponse) -> Result<Page> {
        let items = response
            .body
            .get("values")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| {
                AggregatorError::malformed(
                    provider,
                    &response.url,
                    "expected an object with a `values` array",
                )
            })?;

        Ok(Page {
            items,
            next: response
                .body
                .get("next")
                .and_then(Value::as_str)
                .map(str::to_string),
            total: Self::declared_size(response),
        })
    }

    async fn count(&self, client: &UpstreamClient, start_url: &str) -> Result<u64> {
        let provider = client.provider();
        let url = self.page_url(provider, start_url, 0)?;
        let response = client
            .fetch(&url, Method::Get)
            .await?
            .error_for_status(provider)?;

        Self::declared_size(&response).ok_or_else(|| {
            AggregatorError::malformed(provider, &url, "missing numeric `size` field")
        })
    }
}

/// Walks listings for one provider with a given strategy
#[derive(Debug)]
pub struct Paginator {
    client: UpstreamClient,
    strategy: Box<dyn PaginationStrategy>,
    page_len: u32,
}

impl Paginator {
    pub fn new(
        client: UpstreamClient,
        strategy: impl PaginationStrategy + 'static,
        page_len: u32,
    ) -> Self {
        Self {
            client,
            strategy: Box::new(strategy),
            page_len,
        }
    }

    pub fn client(&self) -> &UpstreamClient {
        &self.client
    }

    /// Fetch and decode a single page
    pub async fn fetch_page(&self, url: &str) -> Result<Page> {
        let response = self
            .client
            .fetch(url, Method::Get)
            .await?
            .error_for_status(self.client.provider())?;
        self.strategy.parse_page(self.client.provider(), &response)
    }

    /// Fetch every page of `start_url` and concatenate the items in page order
    ///
    /// Stops when a page announces no next page or the declared total has been
    /// reached. A next link pointing at an already fetched page is a
    /// [`AggregatorError::PaginationLoop`].
    pub async fn fetch_all(&self, start_url: &str) -> Result<Vec<Value>> {
        let provider = self.client.provider();
        let mut url = self.strategy.page_url(provider, start_url, self.page_len)?;
        let mut visited = HashSet::new();
        let mut items = Vec::new();

        loop {
            if !visited.insert(url.clone()) {
                return Err(AggregatorError::PaginationLoop { provider, url });
            }

            let page = self.fetch_page(&url).await?;
            items.extend(page.items);

            debug!(
                provider = %provider,
                url = %url,
                page = visited.len(),
                fetched = items.len(),
                "Fetched listing page"
            );

            let complete = page.total.is_some_and(|total| items.len() as u64 >= total);
            match page.next {
                Some(next) if !complete => url = parse_url(provider, &next)?.into(),
                _ => break,
            }
        }

        Ok(items)
    }

    /// Count the items at `start_url` without listing them
    pub async fn count(&self, start_url: &str) -> Result<u64> {
        let count = self.strategy.count(&self.client, start_url).await?;
        debug!(provider = %self.client.provider(), url = %start_url, count, "Counted listing");
        Ok(count)
    }
}
