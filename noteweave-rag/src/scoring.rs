//! Mapping raw metric scores onto relevance percentages and confidence buckets.

use serde::{Deserialize, Serialize};

use crate::document::{ConfidenceLevel, SearchResult};
use crate::error::{RagError, Result};
use crate::similarity::SimilarityMetric;

/// Default lower bound of the `high` bucket.
pub const DEFAULT_HIGH_THRESHOLD: f32 = 0.75;
/// Default lower bound of the `medium` bucket.
pub const DEFAULT_MEDIUM_THRESHOLD: f32 = 0.5;

/// Bucket boundaries on the normalized `[0, 1]` relevance scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    /// Relevance at or above this is `high`.
    pub high: f32,
    /// Relevance at or above this (and below `high`) is `medium`.
    pub medium: f32,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self { high: DEFAULT_HIGH_THRESHOLD, medium: DEFAULT_MEDIUM_THRESHOLD }
    }
}

impl ConfidenceThresholds {
    /// Check that `0 <= medium <= high <= 1`.
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f32| (0.0..=1.0).contains(&v);
        if !in_range(self.high) || !in_range(self.medium) || self.medium > self.high {
            return Err(RagError::ConfigError(format!(
                "confidence thresholds must satisfy 0 <= medium ({}) <= high ({}) <= 1",
                self.medium, self.high
            )));
        }
        Ok(())
    }

    /// Bucket a normalized relevance value.
    pub fn classify(&self, relevance: f32) -> ConfidenceLevel {
        if relevance >= self.high {
            ConfidenceLevel::High
        } else if relevance >= self.medium {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// Normalized relevance percentage for a raw score.
pub fn relevance_percentage(metric: SimilarityMetric, score: f32) -> u8 {
    (metric.normalize(score) * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Fill in the relevance and confidence fields of a search result.
pub fn annotate(
    result: &mut SearchResult,
    metric: SimilarityMetric,
    thresholds: &ConfidenceThresholds,
) {
    let relevance = metric.normalize(result.score);
    result.relevance_percentage = Some(relevance_percentage(metric, result.score));
    result.confidence_level = Some(thresholds.classify(relevance));
}
