//! Per-provider profile aggregates

use crate::providers::Provider;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

/// Accumulated statistics for one account on one provider
///
/// Scalar counters only ever grow while a fetcher is accumulating and
/// saturate at `u64::MAX`. The set fields are deduplicated by value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileTotals {
    pub repo_count: u64,
    pub watcher_count: u64,
    pub follower_count: u64,
    pub stars_received_count: u64,
    pub stars_given_count: u64,
    pub open_issues_count: u64,
    pub total_size: u64,
    pub languages_used: BTreeSet<String>,
    pub repo_topics: BTreeSet<String>,
}

impl ProfileTotals {
    pub fn languages_used_count(&self) -> usize {
        self.languages_used.len()
    }

    pub fn repo_topics_count(&self) -> usize {
        self.repo_topics.len()
    }

    /// Combine two sets of totals: counters are summed, sets are unioned.
    ///
    /// The result does not depend on argument order.
    pub fn merge(&self, other: &ProfileTotals) -> ProfileTotals {
        ProfileTotals {
            repo_count: self.repo_count.saturating_add(other.repo_count),
            watcher_count: self.watcher_count.saturating_add(other.watcher_count),
            follower_count: self.follower_count.saturating_add(other.follower_count),
            stars_received_count: self
                .stars_received_count
                .saturating_add(other.stars_received_count),
            stars_given_count: self.stars_given_count.saturating_add(other.stars_given_count),
            open_issues_count: self.open_issues_count.saturating_add(other.open_issues_count),
            total_size: self.total_size.saturating_add(other.total_size),
            languages_used: self
                .languages_used
                .union(&other.languages_used)
                .cloned()
                .collect(),
            repo_topics: self.repo_topics.union(&other.repo_topics).cloned().collect(),
        }
    }
}

/// Finished statistics for one username on one provider
///
/// Only produced by [`AggregateBuilder::finish`] once a fetcher has walked
/// the profile, every repository page and every per-repository count.
#[derive(Debug, Clone)]
pub struct ProfileAggregate {
    provider: Provider,
    username: String,
    user_profile: Value,
    repositories: Vec<Value>,
    totals: ProfileTotals,
}

impl ProfileAggregate {
    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Raw profile object as returned by the provider
    pub fn user_profile(&self) -> &Value {
        &self.user_profile
    }

    /// Raw repository objects in provider page order
    pub fn repositories(&self) -> &[Value] {
        &self.repositories
    }

    pub fn totals(&self) -> &ProfileTotals {
        &self.totals
    }
}

/// Mutable accumulator used while a fetcher is still walking a provider
#[derive(Debug)]
pub struct AggregateBuilder {
    provider: Provider,
    username: String,
    totals: ProfileTotals,
}

impl AggregateBuilder {
    pub fn new(provider: Provider, username: impl Into<String>) -> Self {
        Self {
            provider,
            username: username.into(),
            totals: ProfileTotals::default(),
        }
    }

    pub fn add_repositories(&mut self, count: u64) {
        self.totals.repo_count = self.totals.repo_count.saturating_add(count);
    }

    pub fn add_watchers(&mut self, count: u64) {
        self.totals.watcher_count = self.totals.watcher_count.saturating_add(count);
    }

    pub fn add_followers(&mut self, count: u64) {
        self.totals.follower_count = self.totals.follower_count.saturating_add(count);
    }

    pub fn add_stars_received(&mut self, count: u64) {
        self.totals.stars_received_count = self.totals.stars_received_count.saturating_add(count);
    }

    pub fn add_stars_given(&mut self, count: u64) {
        self.totals.stars_given_count = self.totals.stars_given_count.saturating_add(count);
    }

    pub fn add_open_issues(&mut self, count: u64) {
        self.totals.open_issues_count = self.totals.open_issues_count.saturating_add(count);
    }

    pub fn add_size(&mut self, size: u64) {
        self.totals.total_size = self.totals.total_size.saturating_add(size);
    }

    /// Record a repository language; blank names are ignored
    pub fn add_language(&mut self, language: &str) {
        let language = language.trim();
        if !language.is_empty() {
            self.totals.languages_used.insert(language.to_string());
        }
    }

    pub fn add_topics<I, S>(&mut self, topics: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.totals
            .repo_topics
            .extend(topics.into_iter().map(Into::into));
    }

    /// Freeze the accumulated totals into an aggregate
    pub fn finish(self, user_profile: Value, repositories: Vec<Value>) -> ProfileAggregate {
        ProfileAggregate {
            provider: self.provider,
            username: self.username,
            user_profile,
            repositories,
            totals: self.totals,
        }
    }
}
