//! Vector comparison metrics.
//!
//! All functions assume equal-length inputs; the vector store enforces the
//! dimension before calling into this module.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RagError;

/// The metric a store ranks by. Fixed for the lifetime of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SimilarityMetric {
    /// Cosine similarity, higher is better.
    #[default]
    Cosine,
    /// Euclidean distance, lower is better.
    Euclid,
    /// Unnormalized dot product, higher is better.
    InnerProduct,
}

impl SimilarityMetric {
    /// Compute the raw score between `a` and `b` under this metric.
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            Self::Cosine => cosine_similarity(a, b),
            Self::Euclid => euclidean_distance(a, b),
            Self::InnerProduct => inner_product(a, b),
        }
    }

    /// Whether larger scores mean closer matches.
    pub fn higher_is_better(self) -> bool {
        !matches!(self, Self::Euclid)
    }

    /// Order two scores so that the better match sorts first.
    ///
    /// NaN scores always sort last, keeping the order total.
    pub fn rank(self, a: f32, b: f32) -> Ordering {
        match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) if self.higher_is_better() => b.total_cmp(&a),
            (false, false) => a.total_cmp(&b),
        }
    }

    /// Map a raw score into `[0, 1]`, where 1 is a perfect match.
    ///
    /// - cosine: negative similarity clamps to 0
    /// - inner product: clamped to `[0, 1]`; equals cosine for unit-length embeddings
    /// - euclid: `1 / (1 + d)`, so identical vectors score 1
    pub fn normalize(self, score: f32) -> f32 {
        if score.is_nan() {
            return 0.0;
        }
        match self {
            Self::Cosine | Self::InnerProduct => score.clamp(0.0, 1.0),
            Self::Euclid => 1.0 / (1.0 + score.max(0.0)),
        }
    }

    /// The serialized name of the metric.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclid => "euclid",
            Self::InnerProduct => "innerProduct",
        }
    }
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimilarityMetric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclid" | "euclidean" | "l2" => Ok(Self::Euclid),
            "innerproduct" | "inner_product" | "inner-product" | "dot" => Ok(Self::InnerProduct),
            other => Err(RagError::ConfigError(format!("unknown similarity metric '{other}'"))),
        }
    }
}

/// Dot product of two vectors.
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// L2 norm of a vector.
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = magnitude(a);
    let norm_b = magnitude(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    inner_product(a, b) / (norm_a * norm_b)
}

/// Euclidean distance between two vectors.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn cosine_of_identical_and_orthogonal_vectors() {
        assert!(approx(cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 1.0));
        assert!(approx(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0));
        assert!(approx(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), -1.0));
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 1.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn euclid_and_inner_product() {
        assert!(approx(euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0));
        assert!(approx(euclidean_distance(&[1.0, 1.0], &[1.0, 1.0]), 0.0));
        assert!(approx(inner_product(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0));
    }

    #[test]
    fn rank_puts_better_scores_first() {
        assert_eq!(SimilarityMetric::Cosine.rank(0.9, 0.3), Ordering::Less);
        assert_eq!(SimilarityMetric::InnerProduct.rank(2.0, 5.0), Ordering::Greater);
        assert_eq!(SimilarityMetric::Euclid.rank(1.0, 5.0), Ordering::Less);
        assert_eq!(SimilarityMetric::Euclid.rank(f32::NAN, 5.0), Ordering::Greater);
        assert_eq!(SimilarityMetric::Cosine.rank(0.1, f32::NAN), Ordering::Less);
    }

    #[test]
    fn normalize_is_bounded_for_every_metric() {
        assert_eq!(SimilarityMetric::Cosine.normalize(-0.4), 0.0);
        assert!(approx(SimilarityMetric::Cosine.normalize(0.8), 0.8));
        assert_eq!(SimilarityMetric::InnerProduct.normalize(12.0), 1.0);
        assert_eq!(SimilarityMetric::Euclid.normalize(0.0), 1.0);
        assert!(approx(SimilarityMetric::Euclid.normalize(1.0), 0.5));
        assert_eq!(SimilarityMetric::Euclid.normalize(f32::NAN), 0.0);
    }

    #[test]
    fn parse_metric_names() {
        assert_eq!("cosine".parse::<SimilarityMetric>().unwrap(), SimilarityMetric::Cosine);
        assert_eq!("euclid".parse::<SimilarityMetric>().unwrap(), SimilarityMetric::Euclid);
        assert_eq!(
            "innerProduct".parse::<SimilarityMetric>().unwrap(),
            SimilarityMetric::InnerProduct
        );
        assert!("manhattan".parse::<SimilarityMetric>().is_err());
    }

    #[test]
    fn serde_uses_camel_case_names() {
        let json = serde_json::to_string(&SimilarityMetric::InnerProduct).unwrap();
        assert_eq!(json, "\"innerProduct\"");
        let metric: SimilarityMetric = serde_json::from_str("\"euclid\"").unwrap();
        assert_eq!(metric, SimilarityMetric::Euclid);
    }
}
