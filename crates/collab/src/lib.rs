//! # Collab Crate
//!
//! Memory-based collaborative filtering: "find the users who rate like you,
//! then predict your rating from theirs".
//!
//! ## Components
//!
//! ### SimilarityEngine
//! Scores every co-rater of a target user with Pearson correlation or cosine
//! similarity over the movies both rated, and keeps the k best.
//!
//! ### RecommendationAggregator
//! Pools the movies those k neighbors rated, drops what the target already
//! rated, and predicts a similarity-weighted score for each.
//!
//! Both read data only through the [`RatingStore`] and [`AverageStore`]
//! traits, which [`data_loader::DataIndex`] implements.
//!
//! ## Example Usage
//!
//! ```ignore
//! use collab::{RecommendationAggregator, SimilarityEngine, SimilarityMetric};
//! use data_loader::DataIndex;
//! use std::sync::Arc;
//!
//! let index = Arc::new(DataIndex::load_from_files("data/ml-1m".as_ref())?);
//!
//! let engine = SimilarityEngine::new(index.clone(), index.clone());
//! let neighbors = engine.compute_top_k_neighbors(1, 20, SimilarityMetric::Pearson)?;
//!
//! let aggregator = RecommendationAggregator::new(index.clone());
//! let recommendations = aggregator.recommend(1, &neighbors);
//! ```

pub mod accumulator;
pub mod aggregator;
pub mod error;
pub mod metric;
pub mod similarity;
pub mod store;

pub use accumulator::CoRatingSums;
pub use aggregator::{Contribution, RankedRecommendation, RecommendationAggregator};
pub use error::{CollabError, Result};
pub use metric::SimilarityMetric;
pub use similarity::{Neighbor, SimilarityEngine, SimilarityScore};
pub use store::{AverageStore, RatingStore};
