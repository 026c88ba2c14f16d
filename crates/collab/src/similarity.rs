//! User-user similarity and top-k neighbor selection.
//!
//! ## Algorithm
//! 1. For each movie the target rated, find every other user who rated it
//! 2. Fold each shared movie into that co-rater's [`CoRatingSums`], centering
//!    every rating on its own user's average
//! 3. Turn the sums into a Pearson or cosine similarity; co-raters whose
//!    similarity is undefined (zero denominator) are dropped
//! 4. Sort ascending and keep the last k
//!
//! Per-movie contributions may be gathered on rayon. They are always merged
//! in the order of the target's ratings, so parallel and sequential runs
//! produce bit-identical sums.

use crate::accumulator::CoRatingSums;
use crate::error::{CollabError, Result};
use crate::metric::SimilarityMetric;
use crate::store::{AverageStore, RatingStore};
use data_loader::{Rating, UserId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, instrument};

/// One entry of a top-k list
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub user_id: UserId,
    pub similarity: f64,
}

/// Similarity between the target and one other user under one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityScore {
    pub user_id: UserId,
    pub other_user_id: UserId,
    pub metric: SimilarityMetric,
    pub value: f64,
    /// Movies both users rated
    pub shared_items: usize,
}

impl From<SimilarityScore> for Neighbor {
    fn from(score: SimilarityScore) -> Self {
        Neighbor {
            user_id: score.other_user_id,
            similarity: score.value,
        }
    }
}

/// Finds the users most similar to a target user.
pub struct SimilarityEngine<R, A> {
    ratings: Arc<R>,
    averages: Arc<A>,

    /// Gather per-movie contributions on the rayon pool
    parallel: bool,
}

impl<R: RatingStore, A: AverageStore> SimilarityEngine<R, A> {
    pub fn new(ratings: Arc<R>, averages: Arc<A>) -> Self {
        Self {
            ratings,
            averages,
            parallel: true,
        }
    }

    /// Configure rayon use for accumulation (default: true)
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// The k users most similar to `user_id`, weakest of the k first.
    ///
    /// Returns fewer than k entries when fewer co-raters have a defined
    /// similarity, and an empty list when the user rated nothing or shares
    /// no movie with anyone.
    pub fn compute_top_k_neighbors(
        &self,
        user_id: UserId,
        k: usize,
        metric: SimilarityMetric,
    ) -> Result<Vec<Neighbor>> {
        self.compute_top_k_neighbors_with_cancel(user_id, k, metric, None)
    }

    /// Like [`compute_top_k_neighbors`](Self::compute_top_k_neighbors), but
    /// gives up with [`CollabError::Cancelled`] once `cancel` is raised.
    #[instrument(skip(self, cancel))]
    pub fn compute_top_k_neighbors_with_cancel(
        &self,
        user_id: UserId,
        k: usize,
        metric: SimilarityMetric,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<Vec<Neighbor>> {
        let scores = self.scores(user_id, metric, cancel.as_deref())?;

        let mut neighbors: Vec<Neighbor> = scores.into_iter().map(Neighbor::from).collect();
        let keep_from = neighbors.len().saturating_sub(k);
        let top_k = neighbors.split_off(keep_from);

        debug!("Selected {} of {} candidate neighbors", top_k.len(), neighbors.len() + top_k.len());
        Ok(top_k)
    }

    /// Every defined similarity between `user_id` and its co-raters,
    /// ascending by value.
    #[instrument(skip(self))]
    pub fn compute_similarities(
        &self,
        user_id: UserId,
        metric: SimilarityMetric,
    ) -> Result<Vec<SimilarityScore>> {
        self.scores(user_id, metric, None)
    }

    fn scores(
        &self,
        user_id: UserId,
        metric: SimilarityMetric,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<SimilarityScore>> {
        let sums = self.accumulate(user_id, cancel)?;
        let co_raters = sums.len();

        let mut scores: Vec<SimilarityScore> = sums
            .into_iter()
            .filter_map(|(other_user_id, acc)| {
                acc.similarity(metric).map(|value| SimilarityScore {
                    user_id,
                    other_user_id,
                    metric,
                    value,
                    shared_items: acc.shared,
                })
            })
            .collect();

        // Ties broken by user id so repeated queries agree
        scores.sort_by(|a, b| {
            a.value
                .total_cmp(&b.value)
                .then_with(|| a.other_user_id.cmp(&b.other_user_id))
        });

        debug!(
            "{} co-raters, {} with a defined {} similarity",
            co_raters,
            scores.len(),
            metric
        );
        Ok(scores)
    }

    /// Fold every shared movie into per-co-rater sums.
    fn accumulate(
        &self,
        user_id: UserId,
        cancel: Option<&AtomicBool>,
    ) -> Result<HashMap<UserId, CoRatingSums>> {
        let target_avg = self
            .averages
            .average_of(user_id)
            .ok_or(CollabError::UnknownUser(user_id))?;
        let target_ratings = self.ratings.ratings_by_user(user_id);

        debug!(
            "Accumulating over {} rated movies (average {:.3})",
            target_ratings.len(),
            target_avg
        );

        let contributions: Vec<Vec<(UserId, CoRatingSums)>> = if self.parallel {
            target_ratings
                .par_iter()
                .map(|rating| self.movie_contributions(rating, target_avg, cancel))
                .collect::<Result<_>>()?
        } else {
            target_ratings
                .iter()
                .map(|rating| self.movie_contributions(rating, target_avg, cancel))
                .collect::<Result<_>>()?
        };

        let mut sums: HashMap<UserId, CoRatingSums> = HashMap::new();
        for movie in contributions {
            for (other_user_id, contribution) in movie {
                sums.entry(other_user_id).or_default().merge(&contribution);
            }
        }
        Ok(sums)
    }

    /// One shared-movie contribution per co-rater of `target_rating`'s movie.
    fn movie_contributions(
        &self,
        target_rating: &Rating,
        target_avg: f64,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<(UserId, CoRatingSums)>> {
        check_cancel(cancel)?;

        let others = self
            .ratings
            .raters_of(target_rating.movie_id, target_rating.user_id);

        let mut contributions = Vec::with_capacity(others.len());
        for other in others {
            let Some(other_avg) = self.averages.average_of(other.user_id) else {
                debug!("Skipping co-rater {} without an average", other.user_id);
                continue;
            };
            contributions.push((
                other.user_id,
                CoRatingSums::from_pair(
                    target_rating.rating as f64,
                    target_avg,
                    other.rating as f64,
                    other_avg,
                ),
            ));
        }
        Ok(contributions)
    }
}

fn check_cancel(cancel: Option<&AtomicBool>) -> Result<()> {
    if let Some(flag) = cancel {
        if flag.load(Ordering::SeqCst) {
            return Err(CollabError::Cancelled);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{DataIndex, MovieId, UserAverage};

    fn rate(index: &mut DataIndex, user_id: UserId, movie_id: MovieId, rating: f32) {
        index.insert_rating(Rating {
            user_id,
            movie_id,
            rating,
            timestamp: 1000000,
        });
    }

    /// Users 1-3 rate movies 10 (A) and 11 (B); user 2 also rates 12 (C).
    fn create_test_index() -> DataIndex {
        let mut index = DataIndex::new();

        rate(&mut index, 1, 10, 5.0);
        rate(&mut index, 1, 11, 3.0);

        rate(&mut index, 2, 10, 4.0);
        rate(&mut index, 2, 11, 2.0);
        rate(&mut index, 2, 12, 5.0);

        rate(&mut index, 3, 10, 1.0);
        rate(&mut index, 3, 11, 5.0);

        for (user_id, average) in [(1, 4.0), (2, 3.0), (3, 3.0)] {
            index.insert_average(UserAverage { user_id, average });
        }
        index
    }

    fn engine(index: DataIndex) -> SimilarityEngine<DataIndex, DataIndex> {
        let index = Arc::new(index);
        SimilarityEngine::new(Arc::clone(&index), index)
    }

    #[test]
    fn test_cosine_neighbors() {
        let engine = engine(create_test_index());

        let scores = engine.compute_similarities(1, SimilarityMetric::Cosine).unwrap();
        assert_eq!(scores.len(), 2);
        // Ascending: user 3 first
        assert_eq!(scores[0].other_user_id, 3);
        assert_eq!(scores[1].other_user_id, 2);
        assert!(scores[1].value > 0.96);
        assert!(scores[0].value < scores[1].value);
        // User 2's extra rating of movie 12 is not shared with user 1
        assert_eq!(scores[0].shared_items, 2);
        assert_eq!(scores[1].shared_items, 2);

        let top = engine.compute_top_k_neighbors(1, 1, SimilarityMetric::Cosine).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].user_id, 2);
        assert!((top[0].similarity - 26.0 / 680f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_neighbors() {
        let engine = engine(create_test_index());

        let top = engine.compute_top_k_neighbors(1, 5, SimilarityMetric::Pearson).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].user_id, 3);
        assert!((top[0].similarity + 1.0).abs() < 1e-12);
        assert_eq!(top[1].user_id, 2);
        assert!((top[1].similarity - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_k_zero_is_empty() {
        let engine = engine(create_test_index());
        let top = engine.compute_top_k_neighbors(1, 0, SimilarityMetric::Cosine).unwrap();
        assert!(top.is_empty());
    }

    #[test]
    fn test_unknown_user() {
        let engine = engine(create_test_index());
        let err = engine.compute_top_k_neighbors(99, 3, SimilarityMetric::Pearson).unwrap_err();
        assert_eq!(err, CollabError::UnknownUser(99));
    }

    #[test]
    fn test_user_without_ratings_is_empty() {
        let mut index = create_test_index();
        index.insert_average(UserAverage { user_id: 50, average: 3.0 });
        let engine = engine(index);

        let top = engine.compute_top_k_neighbors(50, 3, SimilarityMetric::Pearson).unwrap();
        assert!(top.is_empty());
    }

    #[test]
    fn test_zero_variance_co_rater_excluded_from_pearson() {
        let mut index = DataIndex::new();
        rate(&mut index, 1, 10, 4.0);
        rate(&mut index, 2, 10, 3.0);
        rate(&mut index, 2, 11, 3.0);
        index.compute_user_averages();
        let engine = engine(index);

        let pearson = engine.compute_top_k_neighbors(1, 5, SimilarityMetric::Pearson).unwrap();
        assert!(pearson.is_empty());

        let cosine = engine.compute_top_k_neighbors(1, 5, SimilarityMetric::Cosine).unwrap();
        assert_eq!(cosine.len(), 1);
        assert!(cosine[0].similarity.is_finite());
    }

    #[test]
    fn test_co_rater_without_average_skipped() {
        let mut index = create_test_index();
        rate(&mut index, 4, 10, 5.0);
        rate(&mut index, 4, 11, 3.0);
        let engine = engine(index);

        let scores = engine.compute_similarities(1, SimilarityMetric::Cosine).unwrap();
        assert!(scores.iter().all(|s| s.other_user_id != 4));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let index = Arc::new(create_test_index());
        let parallel = SimilarityEngine::new(Arc::clone(&index), Arc::clone(&index));
        let sequential = SimilarityEngine::new(Arc::clone(&index), index).with_parallel(false);

        for metric in [SimilarityMetric::Pearson, SimilarityMetric::Cosine] {
            assert_eq!(
                parallel.compute_similarities(1, metric).unwrap(),
                sequential.compute_similarities(1, metric).unwrap()
            );
        }
    }

    #[test]
    fn test_cancelled_query() {
        let engine = engine(create_test_index());
        let cancel = Arc::new(AtomicBool::new(true));

        let err = engine
            .compute_top_k_neighbors_with_cancel(1, 3, SimilarityMetric::Cosine, Some(cancel))
            .unwrap_err();
        assert_eq!(err, CollabError::Cancelled);
    }

    #[test]
    fn test_ties_are_ordered_by_user_id() {
        let mut index = DataIndex::new();
        rate(&mut index, 1, 10, 4.0);
        rate(&mut index, 1, 11, 2.0);
        for user_id in [9, 5, 7] {
            rate(&mut index, user_id, 10, 4.0);
            rate(&mut index, user_id, 11, 2.0);
        }
        index.compute_user_averages();
        let engine = engine(index);

        let top = engine.compute_top_k_neighbors(1, 2, SimilarityMetric::Cosine).unwrap();
        let ids: Vec<UserId> = top.iter().map(|n| n.user_id).collect();
        assert_eq!(ids, vec![7, 9]);
    }
}
