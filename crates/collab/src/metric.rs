use crate::error::CollabError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How two users' rating vectors are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    /// Correlation of the ratings after centering each on its owner's mean
    Pearson,
    /// Angle between the raw rating vectors
    Cosine,
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimilarityMetric::Pearson => write!(f, "pearson"),
            SimilarityMetric::Cosine => write!(f, "cosine"),
        }
    }
}

/// Accepts the metric names case-insensitively, plus the menu numbers
/// `1` (Pearson) and `2` (cosine).
impl FromStr for SimilarityMetric {
    type Err = CollabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pearson" | "1" => Ok(SimilarityMetric::Pearson),
            "cosine" | "2" => Ok(SimilarityMetric::Cosine),
            _ => Err(CollabError::UnknownMetric(s.to_string())),
        }
    }
}
