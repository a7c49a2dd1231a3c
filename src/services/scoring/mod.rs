/// Scoring Module
///
/// Computes the composite relevance score for a (content, viewer) pair from
/// six signals: engagement, recency, quality, author reputation, trending,
/// and follow boost.
///
/// # Workflow
/// 1. Pull interaction counts (all-time and windowed) from the event log
/// 2. Compute each component against the injected weight tables
/// 3. Combine components with the fixed formula into the final score
///
/// Components are persisted next to the final score so rows can be
/// recombined after a weight change without replaying events.
pub mod scorer;

pub use scorer::{rank_ordering, ScoringEngine};

use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("content unavailable: {0}")]
    ContentUnavailable(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ScoringError>;
