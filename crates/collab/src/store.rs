//! Read-only capability interfaces consumed by the engine.
//!
//! The engine never owns ratings or averages. It borrows them through these
//! traits, which keeps it testable against any backing store and lets one
//! loaded [`DataIndex`] serve many concurrent queries.

use data_loader::{DataIndex, MovieId, Rating, UserId};

/// Per-user and per-item rating lookups.
///
/// Implementations must guarantee at most one rating per (user, item) pair.
pub trait RatingStore: Send + Sync {
    /// Every rating made by `user_id`; empty if there are none
    fn ratings_by_user(&self, user_id: UserId) -> &[Rating];

    /// Every rating of `movie_id` by a user other than `excluding`
    fn raters_of(&self, movie_id: MovieId, excluding: UserId) -> Vec<Rating>;

    /// The rating `user_id` gave `movie_id`, if any
    fn rating(&self, user_id: UserId, movie_id: MovieId) -> Option<Rating>;
}

/// Precomputed mean rating per user.
pub trait AverageStore: Send + Sync {
    fn average_of(&self, user_id: UserId) -> Option<f64>;
}

impl RatingStore for DataIndex {
    fn ratings_by_user(&self, user_id: UserId) -> &[Rating] {
        self.get_user_ratings(user_id)
    }

    fn raters_of(&self, movie_id: MovieId, excluding: UserId) -> Vec<Rating> {
        self.get_movie_ratings(movie_id)
            .iter()
            .filter(|r| r.user_id != excluding)
            .copied()
            .collect()
    }

    fn rating(&self, user_id: UserId, movie_id: MovieId) -> Option<Rating> {
        self.get_rating(user_id, movie_id).copied()
    }
}

impl AverageStore for DataIndex {
    fn average_of(&self, user_id: UserId) -> Option<f64> {
        self.get_user_average(user_id)
    }
}
