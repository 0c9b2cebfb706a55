//! Configuration for the vector store, chunking and the RAG orchestrator.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chunking::{Chunker, FixedSizeChunker, MarkdownChunker, RecursiveChunker};
use crate::error::{RagError, Result};
use crate::provider::{CompletionOptions, ProviderKind};
use crate::scoring::ConfidenceThresholds;
use crate::similarity::SimilarityMetric;

/// Configuration of one vector store. Set once at construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VectorStoreConfig {
    /// Length every stored embedding must have.
    pub dimension: usize,
    /// Metric used for ranking.
    pub similarity_metric: SimilarityMetric,
    /// Optional JSON file the store is loaded from and saved to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl VectorStoreConfig {
    /// An in-memory configuration with no persistence.
    pub fn new(dimension: usize, similarity_metric: SimilarityMetric) -> Self {
        Self { dimension, similarity_metric, path: None }
    }

    /// Persist the store to `path`.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Check that the dimension is positive.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(RagError::ConfigError("dimension must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Which [`Chunker`] implementation ingestion uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategy {
    /// Fixed character windows.
    Fixed,
    /// Paragraphs, then sentences, then words.
    Recursive,
    /// Markdown sections, then recursive splitting.
    #[default]
    Markdown,
}

/// Options controlling how documents are split before embedding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkingOptions {
    /// Upper bound on a chunk, counted in characters.
    pub chunk_size: usize,
    /// Characters shared by neighbouring fixed-size windows.
    pub chunk_overlap: usize,
    /// Chunks shorter than this are merged into their predecessor.
    pub min_chunk_size: usize,
    /// Splitting strategy.
    pub strategy: ChunkingStrategy,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            min_chunk_size: 100,
            strategy: ChunkingStrategy::default(),
        }
    }
}

impl ChunkingOptions {
    /// Check that overlap is smaller than the chunk size.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.min_chunk_size > self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "min_chunk_size ({}) must not exceed chunk_size ({})",
                self.min_chunk_size, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Build the chunker these options describe.
    pub fn chunker(&self) -> Arc<dyn Chunker> {
        let (size, overlap, min) = (self.chunk_size, self.chunk_overlap, self.min_chunk_size);
        match self.strategy {
            ChunkingStrategy::Fixed => {
                Arc::new(FixedSizeChunker::new(size, overlap).with_min_chunk_size(min))
            }
            ChunkingStrategy::Recursive => {
                Arc::new(RecursiveChunker::new(size, overlap).with_min_chunk_size(min))
            }
            ChunkingStrategy::Markdown => {
                Arc::new(MarkdownChunker::new(size, overlap).with_min_chunk_size(min))
            }
        }
    }
}

/// Configuration parameters for the RAG orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Number of documents retrieved per question when the caller does not say.
    pub top_k: usize,
    /// Minimum normalized relevance for a source to be kept (0 keeps everything).
    pub similarity_threshold: f32,
    /// Characters of retrieved context allowed in one prompt.
    pub context_budget_chars: usize,
    /// Confidence bucket boundaries.
    pub confidence: ConfidenceThresholds,
    /// Chunking used by ingestion.
    pub chunking: ChunkingOptions,
    /// Default completion parameters.
    pub completion: CompletionOptions,
    /// Provider used to embed ingested documents and, unless overridden, questions.
    pub embedding_provider: Option<ProviderKind>,
    /// Upper bound on each provider call.
    pub request_timeout: Option<Duration>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_threshold: 0.0,
            context_budget_chars: 12_000,
            confidence: ConfidenceThresholds::default(),
            chunking: ChunkingOptions::default(),
            completion: CompletionOptions::default(),
            embedding_provider: None,
            request_timeout: None,
        }
    }
}

impl RagConfig {
    /// Start from the defaults and override what you need.
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Fluent construction of a [`RagConfig`], validated by [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the number of documents retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum normalized relevance for sources.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set the prompt context budget in characters.
    pub fn context_budget_chars(mut self, chars: usize) -> Self {
        self.config.context_budget_chars = chars;
        self
    }

    /// Set the confidence bucket boundaries.
    pub fn confidence(mut self, thresholds: ConfidenceThresholds) -> Self {
        self.config.confidence = thresholds;
        self
    }

    /// Set the chunking options.
    pub fn chunking(mut self, options: ChunkingOptions) -> Self {
        self.config.chunking = options;
        self
    }

    /// Set the default completion parameters.
    pub fn completion(mut self, options: CompletionOptions) -> Self {
        self.config.completion = options;
        self
    }

    /// Provider that embeds ingested notes, and questions that name no embedding provider.
    pub fn embedding_provider(mut self, kind: ProviderKind) -> Self {
        self.config.embedding_provider = Some(kind);
        self
    }

    /// Bound every provider call by `timeout`.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// Finish the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `top_k == 0`
    /// - `context_budget_chars == 0`
    /// - `similarity_threshold` is outside `[0, 1]`
    /// - the confidence thresholds or chunking options are inconsistent
    pub fn build(self) -> Result<RagConfig> {
        if self.config.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.config.context_budget_chars == 0 {
            return Err(RagError::ConfigError(
                "context_budget_chars must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.config.similarity_threshold) {
            return Err(RagError::ConfigError(format!(
                "similarity_threshold ({}) must be within [0, 1]",
                self.config.similarity_threshold
            )));
        }
        self.config.confidence.validate()?;
        self.config.chunking.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RagConfig::builder().build().unwrap();
        assert_eq!(config.top_k, 5);
        assert_eq!(config.confidence, ConfidenceThresholds::default());
    }

    #[test]
    fn rejects_zero_top_k() {
        let err = RagConfig::builder().top_k(0).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let chunking =
            ChunkingOptions { chunk_size: 100, chunk_overlap: 100, ..Default::default() };
        assert!(RagConfig::builder().chunking(chunking).build().is_err());
    }

    #[test]
    fn rejects_zero_dimension() {
        assert!(VectorStoreConfig::new(0, SimilarityMetric::Cosine).validate().is_err());
        assert!(VectorStoreConfig::new(3, SimilarityMetric::Euclid).validate().is_ok());
    }

    #[test]
    fn store_config_serializes_metric_name() {
        let config = VectorStoreConfig::new(3, SimilarityMetric::InnerProduct);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["similarityMetric"], "innerProduct");
        assert!(json.get("path").is_none());
    }
}
