//! Error types for the data-loader crate.
//!
//! Malformed records are recoverable and never reach these variants from the
//! batch parsers (they are logged and skipped). What does surface here is
//! anything that makes the dataset as a whole unusable.

use thiserror::Error;

use crate::types::{MovieId, UserId};

/// Errors that can occur during data loading and parsing
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// File could not be found or opened
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Line in data file couldn't be parsed
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A data field had an invalid value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// The same user rated the same movie more than once
    #[error("Duplicate rating: user {user_id} rated movie {movie_id} more than once")]
    DuplicateRating { user_id: UserId, movie_id: MovieId },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;
