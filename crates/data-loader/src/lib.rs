//! # Data Loader Crate
//!
//! Loads MovieLens-style rating datasets into an in-memory [`DataIndex`].
//!
//! ## Main Components
//!
//! - **types**: Core domain types (Rating, Movie, UserAverage, DataIndex)
//! - **parser**: Parse .dat files into Rust structs
//! - **index**: Load a dataset directory, compute user averages, validate
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::DataIndex;
//! use std::path::Path;
//!
//! let index = DataIndex::load_from_files(Path::new("data/ml-1m"))?;
//!
//! let ratings = index.get_user_ratings(1);
//! let average = index.get_user_average(1);
//! println!("User 1 rated {} movies (mean {:?})", ratings.len(), average);
//! ```

pub mod error;
pub mod index;
pub mod parser;
pub mod types;

pub use error::{DataLoadError, Result};
pub use types::{DataIndex, Movie, MovieId, Rating, UserAverage, UserId};
