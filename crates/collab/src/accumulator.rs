//! Running sums for one (target, co-rater) pair.

use crate::metric::SimilarityMetric;

/// The six sums both similarity metrics are derived from, accumulated over
/// the items the two users have both rated.
///
/// `x` is the target user, `y` the co-rater. The `s*` sums use ratings
/// centered on each user's own mean; the `p*` sums use raw ratings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoRatingSums {
    pub sxy: f64,
    pub sxx: f64,
    pub syy: f64,
    pub pxy: f64,
    pub pxx: f64,
    pub pyy: f64,
    /// Number of shared items folded in
    pub shared: usize,
}

impl CoRatingSums {
    /// Sums for a single shared item.
    pub fn from_pair(target_rating: f64, target_avg: f64, other_rating: f64, other_avg: f64) -> Self {
        let dx = target_rating - target_avg;
        let dy = other_rating - other_avg;
        Self {
            sxy: dx * dy,
            sxx: dx * dx,
            syy: dy * dy,
            pxy: target_rating * other_rating,
            pxx: target_rating * target_rating,
            pyy: other_rating * other_rating,
            shared: 1,
        }
    }

    pub fn merge(&mut self, other: &CoRatingSums) {
        self.sxy += other.sxy;
        self.sxx += other.sxx;
        self.syy += other.syy;
        self.pxy += other.pxy;
        self.pxx += other.pxx;
        self.pyy += other.pyy;
        self.shared += other.shared;
    }

    /// Pearson correlation, or `None` when either user has zero variance
    /// over the shared items.
    pub fn pearson(&self) -> Option<f64> {
        ratio(self.sxy, self.sxx, self.syy)
    }

    /// Cosine similarity, or `None` when either vector has zero magnitude.
    pub fn cosine(&self) -> Option<f64> {
        ratio(self.pxy, self.pxx, self.pyy)
    }

    pub fn similarity(&self, metric: SimilarityMetric) -> Option<f64> {
        match metric {
            SimilarityMetric::Pearson => self.pearson(),
            SimilarityMetric::Cosine => self.cosine(),
        }
    }
}

/// `num / sqrt(a * b)`, clamped to [-1, 1] to absorb rounding.
fn ratio(num: f64, a: f64, b: f64) -> Option<f64> {
    let denom = a * b;
    if denom <= 0.0 || !denom.is_finite() {
        return None;
    }
    let value = num / denom.sqrt();
    value.is_finite().then(|| value.clamp(-1.0, 1.0))
}
