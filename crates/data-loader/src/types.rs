//! Core domain types for rating datasets.
//!
//! Ratings, the movie catalog and per-user averages all live in one
//! [`DataIndex`]. The index only ever hands out borrowed views, so a loaded
//! dataset can be shared read-only behind an `Arc` for the lifetime of the
//! process.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// Type Aliases
// =============================================================================

/// Unique identifier for a user. Ids are not assumed to be contiguous.
pub type UserId = u32;

/// Unique identifier for a movie
pub type MovieId = u32;

// =============================================================================
// Catalog
// =============================================================================

/// A movie from the catalog (`movies.dat`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    /// Year extracted from title (e.g., "Toy Story (1995)")
    pub year: Option<u16>,
    /// Raw genre labels, in file order
    pub genres: Vec<String>,
}

// =============================================================================
// Ratings
// =============================================================================

/// A single rating from a user for a movie.
///
/// The scale is whatever the dataset uses; nothing in the workspace assumes
/// a particular minimum or maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub rating: f32,
    /// Unix timestamp when rating was made
    pub timestamp: i64,
}

/// Mean rating of one user, used to center that user's ratings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserAverage {
    pub user_id: UserId,
    pub average: f64,
}

// =============================================================================
// DataIndex
// =============================================================================

/// In-memory rating database with lookups in both directions.
#[derive(Debug)]
pub struct DataIndex {
    pub(crate) movies: HashMap<MovieId, Movie>,

    /// All ratings made by each user
    pub(crate) user_ratings: HashMap<UserId, Vec<Rating>>,
    /// All ratings received by each movie
    pub(crate) movie_ratings: HashMap<MovieId, Vec<Rating>>,
    /// Direct (user, movie) lookup; the last insert wins on duplicates
    pub(crate) rating_lookup: HashMap<(UserId, MovieId), Rating>,

    /// Precomputed mean rating per user
    pub(crate) user_averages: HashMap<UserId, f64>,
}

impl DataIndex {
    /// Creates a new, empty DataIndex
    pub fn new() -> Self {
        Self {
            movies: HashMap::new(),
            user_ratings: HashMap::new(),
            movie_ratings: HashMap::new(),
            rating_lookup: HashMap::new(),
            user_averages: HashMap::new(),
        }
    }

    /// Get a movie by ID
    pub fn get_movie(&self, id: MovieId) -> Option<&Movie> {
        self.movies.get(&id)
    }

    /// Get all ratings made by a user, in insertion order.
    ///
    /// Returns an empty slice if user has no ratings
    pub fn get_user_ratings(&self, user_id: UserId) -> &[Rating] {
        self.user_ratings
            .get(&user_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Get all ratings for a movie
    pub fn get_movie_ratings(&self, movie_id: MovieId) -> &[Rating] {
        self.movie_ratings
            .get(&movie_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Look up the rating `user_id` gave `movie_id`, if any.
    pub fn get_rating(&self, user_id: UserId, movie_id: MovieId) -> Option<&Rating> {
        self.rating_lookup.get(&(user_id, movie_id))
    }

    /// Get the precomputed average for a user
    pub fn get_user_average(&self, user_id: UserId) -> Option<f64> {
        self.user_averages.get(&user_id).copied()
    }

    /// All user ids that have at least one rating, sorted ascending.
    pub fn get_all_user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.user_ratings.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    // Mutators, used during data loading

    /// Insert a movie into the catalog
    pub fn insert_movie(&mut self, movie: Movie) {
        self.movies.insert(movie.id, movie);
    }

    /// Insert a rating and update the lookup indices
    pub fn insert_rating(&mut self, rating: Rating) {
        self.rating_lookup
            .insert((rating.user_id, rating.movie_id), rating);

        self.user_ratings
            .entry(rating.user_id)
            .or_insert_with(Vec::new)
            .push(rating);

        self.movie_ratings
            .entry(rating.movie_id)
            .or_insert_with(Vec::new)
            .push(rating);
    }

    /// Record an average for a user, replacing any previous value.
    ///
    /// Normally averages come from [`DataIndex::compute_user_averages`]; this
    /// exists for averages computed elsewhere.
    pub fn insert_average(&mut self, average: UserAverage) {
        self.user_averages.insert(average.user_id, average.average);
    }

    /// Get counts for debugging/validation: (movies, users with ratings, ratings)
    pub fn counts(&self) -> (usize, usize, usize) {
        let total_ratings = self.user_ratings.values().map(|v| v.len()).sum();
        (self.movies.len(), self.user_ratings.len(), total_ratings)
    }
}

impl Default for DataIndex {
    fn default() -> Self {
        Self::new()
    }
}
