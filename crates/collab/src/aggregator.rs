//! Similarity-weighted rating prediction over a neighbor list.
//!
//! ## Algorithm
//! 1. Pool every movie rated by any neighbor, minus the target's own movies
//! 2. For each pooled movie `m`:
//!    `score(m) = Σ sim(n) · r(n, m) / Σ |sim(n)|` over neighbors that rated m
//! 3. Drop movies whose total weight is zero; sort by score descending

use crate::similarity::Neighbor;
use crate::store::RatingStore;
use data_loader::{MovieId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};

/// A predicted rating for a movie the target has not rated
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedRecommendation {
    pub movie_id: MovieId,
    pub predicted_score: f64,
    /// Number of neighbors whose rating fed the prediction
    pub contributors: usize,
}

/// One neighbor's part in a prediction, for explanations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub user_id: UserId,
    pub similarity: f64,
    pub rating: f32,
}

#[derive(Default)]
struct WeightedSum {
    numerator: f64,
    denominator: f64,
    contributors: usize,
}

/// Turns a neighbor list into ranked movie recommendations.
pub struct RecommendationAggregator<R> {
    ratings: Arc<R>,
}

impl<R: RatingStore> RecommendationAggregator<R> {
    pub fn new(ratings: Arc<R>) -> Self {
        Self { ratings }
    }

    /// Rank every movie the neighbors rated and `user_id` did not.
    ///
    /// The order of `neighbors` does not matter beyond summation order.
    /// The target itself and repeated user ids in `neighbors` are ignored
    /// after their first appearance.
    #[instrument(skip(self, neighbors), fields(neighbor_count = neighbors.len()))]
    pub fn recommend(&self, user_id: UserId, neighbors: &[Neighbor]) -> Vec<RankedRecommendation> {
        let watched: HashSet<MovieId> = self
            .ratings
            .ratings_by_user(user_id)
            .iter()
            .map(|r| r.movie_id)
            .collect();

        let mut candidates: BTreeMap<MovieId, WeightedSum> = BTreeMap::new();
        for neighbor in distinct_neighbors(user_id, neighbors) {
            for rating in self.ratings.ratings_by_user(neighbor.user_id) {
                if watched.contains(&rating.movie_id) {
                    continue;
                }
                let sum = candidates.entry(rating.movie_id).or_default();
                sum.numerator += neighbor.similarity * rating.rating as f64;
                sum.denominator += neighbor.similarity.abs();
                sum.contributors += 1;
            }
        }

        let pooled = candidates.len();
        let mut recommendations: Vec<RankedRecommendation> = candidates
            .into_iter()
            .filter(|(_, sum)| sum.denominator > 0.0)
            .map(|(movie_id, sum)| RankedRecommendation {
                movie_id,
                predicted_score: sum.numerator / sum.denominator,
                contributors: sum.contributors,
            })
            .collect();

        // Stable sort over movie-id order keeps ties ascending by id
        recommendations.sort_by(|a, b| b.predicted_score.total_cmp(&a.predicted_score));

        debug!(
            "Pooled {} candidate movies, {} with a defined prediction",
            pooled,
            recommendations.len()
        );
        recommendations
    }

    /// The neighbors that rated `movie_id`, with their similarity and rating.
    pub fn explain(&self, user_id: UserId, movie_id: MovieId, neighbors: &[Neighbor]) -> Vec<Contribution> {
        distinct_neighbors(user_id, neighbors)
            .filter_map(|neighbor| {
                self.ratings
                    .rating(neighbor.user_id, movie_id)
                    .map(|rating| Contribution {
                        user_id: neighbor.user_id,
                        similarity: neighbor.similarity,
                        rating: rating.rating,
                    })
            })
            .collect()
    }
}

fn distinct_neighbors<'a>(
    user_id: UserId,
    neighbors: &'a [Neighbor],
) -> impl Iterator<Item = &'a Neighbor> + 'a {
    let mut seen = HashSet::new();
    neighbors
        .iter()
        .filter(move |n| n.user_id != user_id && seen.insert(n.user_id))
}
