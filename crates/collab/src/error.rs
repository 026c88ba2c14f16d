//! Errors surfaced by the similarity engine.
//!
//! Undefined similarities and undefined predictions are not errors: the
//! affected users or items are simply left out of the result.

use data_loader::UserId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollabError {
    /// The target user has no average record, so nothing can be centered
    #[error("Unknown user: {0} has no average rating")]
    UnknownUser(UserId),

    /// The caller raised the cancellation flag mid-query
    #[error("Query cancelled")]
    Cancelled,

    /// A metric name that is neither pearson nor cosine
    #[error("Unknown similarity metric: {0} (expected pearson or cosine)")]
    UnknownMetric(String),
}

pub type Result<T> = std::result::Result<T, CollabError>;
