//! DataIndex building: loading, user averages and validation.

use crate::error::{DataLoadError, Result};
use crate::parser;
use crate::types::*;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

impl DataIndex {
    /// Load a dataset directory containing `ratings.dat` and `movies.dat`.
    ///
    /// Steps:
    /// 1. Parse both files in parallel
    /// 2. Build the catalog and the two rating indices
    /// 3. Validate that every (user, movie) pair is rated once
    /// 4. Compute per-user averages
    pub fn load_from_files(data_dir: &Path) -> Result<Self> {
        info!("Loading dataset from {:?}", data_dir);

        let movies_path = data_dir.join("movies.dat");
        let ratings_path = data_dir.join("ratings.dat");

        let (movies, ratings) = rayon::join(
            || parser::parse_movies(&movies_path),
            || parser::parse_ratings(&ratings_path),
        );
        let movies = movies?;
        let ratings = ratings?;

        info!("Loaded {} movies, {} ratings", movies.len(), ratings.len());

        let mut index = DataIndex::new();
        for movie in movies {
            index.insert_movie(movie);
        }
        for rating in ratings {
            index.insert_rating(rating);
        }

        index.validate()?;
        index.compute_user_averages();

        info!("DataIndex built: {} users with averages", index.user_averages.len());
        Ok(index)
    }

    /// Compute the mean rating of every user that has at least one rating.
    ///
    /// Replaces any averages inserted earlier.
    pub fn compute_user_averages(&mut self) {
        self.user_averages = self
            .user_ratings
            .par_iter()
            .filter(|(_, ratings)| !ratings.is_empty())
            .map(|(&user_id, ratings)| {
                let total: f64 = ratings.iter().map(|r| r.rating as f64).sum();
                (user_id, total / ratings.len() as f64)
            })
            .collect();
    }

    /// All stored averages, ordered by user id.
    pub fn user_averages(&self) -> Vec<UserAverage> {
        let mut averages: Vec<UserAverage> = self
            .user_averages
            .iter()
            .map(|(&user_id, &average)| UserAverage { user_id, average })
            .collect();
        averages.sort_unstable_by_key(|a| a.user_id);
        averages
    }

    /// Validate data integrity
    ///
    /// Checks that:
    /// - no user rated the same movie twice
    /// - every rating value is finite
    pub fn validate(&self) -> Result<()> {
        for ratings in self.user_ratings.values() {
            let mut seen = HashSet::with_capacity(ratings.len());
            for rating in ratings {
                if !seen.insert(rating.movie_id) {
                    return Err(DataLoadError::DuplicateRating {
                        user_id: rating.user_id,
                        movie_id: rating.movie_id,
                    });
                }
                if !rating.rating.is_finite() {
                    return Err(DataLoadError::InvalidValue {
                        field: "rating".to_string(),
                        value: rating.rating.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
