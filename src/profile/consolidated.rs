//! Consolidation of the GitHub and Bitbucket aggregates

use super::aggregate::{ProfileAggregate, ProfileTotals};
use serde::Serialize;
use std::collections::BTreeSet;

/// Combined statistics for a GitHub account and a Bitbucket account
///
/// Serialized as the `/api/profile` response body. Set-valued fields are
/// emitted as sorted arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsolidatedProfile {
    pub github_username: String,
    pub bitbucket_username: String,
    pub total_repo_count: u64,
    pub total_watcher_count: u64,
    pub total_follower_count: u64,
    pub total_stars_received_count: u64,
    pub total_stars_given_count: u64,
    pub total_open_issues_count: u64,
    pub total_size: u64,
    pub languages_used: BTreeSet<String>,
    pub languages_used_count: usize,
    pub repo_topics: BTreeSet<String>,
    pub repo_topics_count: usize,
}

impl ConsolidatedProfile {
    /// Merge two finished aggregates. Performs no I/O.
    pub fn new(github: &ProfileAggregate, bitbucket: &ProfileAggregate) -> Self {
        Self::from_totals(
            github.username(),
            bitbucket.username(),
            github.totals().merge(bitbucket.totals()),
        )
    }

    fn from_totals(github_username: &str, bitbucket_username: &str, totals: ProfileTotals) -> Self {
        Self {
            github_username: github_username.to_string(),
            bitbucket_username: bitbucket_username.to_string(),
            total_repo_count: totals.repo_count,
            total_watcher_count: totals.watcher_count,
            total_follower_count: totals.follower_count,
            total_stars_received_count: totals.stars_received_count,
            total_stars_given_count: totals.stars_given_count,
            total_open_issues_count: totals.open_issues_count,
            total_size: totals.total_size,
            languages_used_count: totals.languages_used_count(),
            repo_topics_count: totals.repo_topics_count(),
            languages_used: totals.languages_used,
            repo_topics: totals.repo_topics,
        }
    }
}
