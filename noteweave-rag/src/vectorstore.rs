//! Vector store trait for storing and searching embedded documents.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::VectorStoreConfig;
use crate::document::{EmbeddedDocument, Metadata, SearchResult};
use crate::error::Result;
use crate::progress::ProgressCallback;

/// Counts describing the store contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Distinct logical documents (chunks of one document count once).
    pub document_count: usize,
    /// Stored entries.
    pub vector_count: usize,
}

/// One logical document in an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// The logical document id.
    pub id: String,
    /// Metadata of the document's first stored entry.
    #[serde(default)]
    pub metadata: Metadata,
}

/// Full-state snapshot produced by [`VectorStore::export_data`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportData {
    /// One summary per logical document.
    #[serde(default)]
    pub documents: Vec<DocumentSummary>,
    /// Every stored entry in insertion order.
    pub vectors: Vec<EmbeddedDocument>,
}

/// A storage backend for embedded documents with exact similarity search.
///
/// Implementations own the collection for one dimension/metric pair and are
/// the single source of truth for ranking. Writes are mutually exclusive with
/// each other, with persistence and with in-flight searches.
///
/// # Example
///
/// ```rust,ignore
/// use noteweave_rag::{InMemoryVectorStore, SimilarityMetric, VectorStore};
///
/// let store = InMemoryVectorStore::new(384, SimilarityMetric::Cosine)?;
/// store.add_documents(embedded).await?;
/// let results = store.similarity_search(&query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The configuration this store was built with.
    fn config(&self) -> &VectorStoreConfig;

    /// Insert or replace one document by id.
    async fn add_document(&self, document: EmbeddedDocument) -> Result<()>;

    /// Insert or replace a batch. The batch is validated as a whole and
    /// persisted once.
    async fn add_documents(&self, documents: Vec<EmbeddedDocument>) -> Result<()>;

    /// Remove the entry with this id and every chunk belonging to it.
    ///
    /// Returns whether anything was removed.
    async fn remove_document(&self, id: &str) -> bool;

    /// Replace the logical document `document_id` (the entry itself and all
    /// of its chunks) with `documents` in one write, persisted once.
    ///
    /// Readers see either the old entries or the new ones, never neither. On
    /// a dimension mismatch nothing changes.
    async fn replace_document(
        &self,
        document_id: &str,
        documents: Vec<EmbeddedDocument>,
    ) -> Result<()>;

    /// Remove every entry whose `source` metadata equals `source`.
    ///
    /// Returns the number of entries removed.
    async fn remove_documents_by_source(&self, source: &str) -> usize;

    /// Return at most `limit` entries, best match first.
    async fn similarity_search(&self, embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// Look up one entry by id.
    async fn get_document(&self, id: &str) -> Option<EmbeddedDocument>;

    /// Every entry belonging to the logical document `document_id`.
    async fn get_vectors_by_document_id(&self, document_id: &str) -> Vec<EmbeddedDocument>;

    /// Every stored entry in insertion order.
    async fn get_all_documents(&self) -> Vec<EmbeddedDocument>;

    /// Number of stored entries.
    async fn get_document_count(&self) -> usize;

    /// Document and vector counts.
    async fn stats(&self) -> StoreStats;

    /// Snapshot the full state.
    async fn export_data(&self) -> ExportData;

    /// Replace the full state with `data`.
    ///
    /// The payload is validated before anything changes; on rejection the
    /// live collection is untouched and a `failed` progress event is emitted.
    async fn import_data(
        &self,
        data: ExportData,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<()>;
}
