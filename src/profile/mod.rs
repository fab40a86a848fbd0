//! Profile data model
//!
//! - [`ProfileAggregate`]: finished statistics for one username on one provider
//! - [`ConsolidatedProfile`]: the merge of a GitHub and a Bitbucket aggregate

mod aggregate;
mod consolidated;

pub use aggregate::{AggregateBuilder, ProfileAggregate, ProfileTotals};
pub use consolidated::ConsolidatedProfile;
