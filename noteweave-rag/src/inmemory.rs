//! In-memory vector store with optional JSON persistence.
//!
//! This module provides [`InMemoryVectorStore`], an exact brute-force store
//! backed by an insertion-ordered `Vec` protected by a `tokio::sync::RwLock`.
//! Searches hold the read lock for the whole scan; writes hold the write lock
//! through persistence, so a save always reflects the write that triggered it.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::config::VectorStoreConfig;
use crate::document::{EmbeddedDocument, SearchResult};
use crate::error::{RagError, Result};
use crate::persistence;
use crate::progress::{ProgressCallback, ProgressReporter};
use crate::similarity::SimilarityMetric;
use crate::vectorstore::{DocumentSummary, ExportData, StoreStats, VectorStore};

/// Entries plus an id → position index.
#[derive(Debug, Default)]
struct StoreState {
    entries: Vec<EmbeddedDocument>,
    positions: HashMap<String, usize>,
}

impl StoreState {
    fn from_entries(entries: Vec<EmbeddedDocument>) -> Self {
        let mut state = Self::default();
        for entry in entries {
            state.upsert(entry);
        }
        state
    }

    /// Replace in place when the id exists, append otherwise.
    fn upsert(&mut self, entry: EmbeddedDocument) {
        match self.positions.get(&entry.id) {
            Some(&pos) => self.entries[pos] = entry,
            None => {
                self.positions.insert(entry.id.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Remove every entry matching `predicate`, keeping relative order.
    fn remove_where(&mut self, predicate: impl Fn(&EmbeddedDocument) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !predicate(entry));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.reindex();
        }
        removed
    }

    fn reindex(&mut self) {
        self.positions =
            self.entries.iter().enumerate().map(|(pos, entry)| (entry.id.clone(), pos)).collect();
    }

    fn belongs_to(entry: &EmbeddedDocument, document_id: &str) -> bool {
        entry.id == document_id || entry.document_id() == document_id
    }
}

/// An exact, in-memory vector store for one dimension/metric pair.
///
/// # Example
///
/// ```rust,ignore
/// use noteweave_rag::{InMemoryVectorStore, VectorStoreConfig, SimilarityMetric};
///
/// let config = VectorStoreConfig::new(768, SimilarityMetric::Cosine).with_path("kb/store.json");
/// let store = InMemoryVectorStore::open(config).await?;
/// ```
#[derive(Debug)]
pub struct InMemoryVectorStore {
    config: VectorStoreConfig,
    state: RwLock<StoreState>,
}

impl InMemoryVectorStore {
    /// Create an empty store without persistence.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `dimension` is zero.
    pub fn new(dimension: usize, metric: SimilarityMetric) -> Result<Self> {
        Self::with_entries(VectorStoreConfig::new(dimension, metric), Vec::new())
    }

    /// Create a store from `config`, loading the persisted file if a path is set.
    ///
    /// An unreadable or corrupt file yields an empty store; it never fails
    /// construction.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the configuration is invalid.
    pub async fn open(config: VectorStoreConfig) -> Result<Self> {
        config.validate()?;
        let entries = match &config.path {
            Some(path) => persistence::load_documents(path, config.dimension).await,
            None => Vec::new(),
        };
        Self::with_entries(config, entries)
    }

    fn with_entries(config: VectorStoreConfig, entries: Vec<EmbeddedDocument>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, state: RwLock::new(StoreState::from_entries(entries)) })
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.config.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.config.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }

    /// Save the current state if persistence is configured. Failures are
    /// logged; the in-memory state stays authoritative.
    async fn persist(&self, state: &StoreState) {
        let Some(path) = &self.config.path else {
            return;
        };
        match persistence::save_documents(path, &state.entries).await {
            Ok(()) => debug!(
                path = %path.display(),
                vector_count = state.entries.len(),
                "saved vector store"
            ),
            Err(e) => error!(error = %e, "failed to save vector store, keeping in-memory state"),
        }
    }

    fn validate_import(&self, data: &ExportData) -> Result<()> {
        let mut seen = HashSet::with_capacity(data.vectors.len());
        for (i, vector) in data.vectors.iter().enumerate() {
            if vector.id.is_empty() {
                return Err(RagError::MalformedImport(format!("vector #{i} has an empty id")));
            }
            if !seen.insert(vector.id.as_str()) {
                return Err(RagError::MalformedImport(format!(
                    "duplicate vector id '{}'",
                    vector.id
                )));
            }
            self.check_dimension(&vector.embedding)?;
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn config(&self) -> &VectorStoreConfig {
        &self.config
    }

    async fn add_document(&self, document: EmbeddedDocument) -> Result<()> {
        self.check_dimension(&document.embedding)?;
        let mut state = self.state.write().await;
        debug!(document.id = %document.id, "upserting document");
        state.upsert(document);
        self.persist(&state).await;
        Ok(())
    }

    async fn add_documents(&self, documents: Vec<EmbeddedDocument>) -> Result<()> {
        for document in &documents {
            self.check_dimension(&document.embedding)?;
        }
        if documents.is_empty() {
            return Ok(());
        }
        let mut state = self.state.write().await;
        let count = documents.len();
        for document in documents {
            state.upsert(document);
        }
        debug!(batch_size = count, "upserted document batch");
        self.persist(&state).await;
        Ok(())
    }

    async fn remove_document(&self, id: &str) -> bool {
        let mut state = self.state.write().await;
        let removed = state.remove_where(|entry| StoreState::belongs_to(entry, id));
        if removed == 0 {
            return false;
        }
        info!(document.id = %id, removed, "removed document");
        self.persist(&state).await;
        true
    }

    async fn replace_document(
        &self,
        document_id: &str,
        documents: Vec<EmbeddedDocument>,
    ) -> Result<()> {
        for document in &documents {
            self.check_dimension(&document.embedding)?;
        }
        let mut state = self.state.write().await;
        let removed = state.remove_where(|entry| StoreState::belongs_to(entry, document_id));
        let added = documents.len();
        for document in documents {
            state.upsert(document);
        }
        debug!(document.id = %document_id, removed, added, "replaced document");
        self.persist(&state).await;
        Ok(())
    }

    async fn remove_documents_by_source(&self, source: &str) -> usize {
        let mut state = self.state.write().await;
        let removed = state.remove_where(|entry| entry.source() == Some(source));
        if removed > 0 {
            info!(source, removed, "removed documents by source");
            self.persist(&state).await;
        }
        removed
    }

    async fn similarity_search(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let state = self.state.read().await;
        if state.entries.is_empty() {
            return Ok(Vec::new());
        }
        self.check_dimension(embedding)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let metric = self.config.similarity_metric;
        let mut scored: Vec<(usize, f32)> = state
            .entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (pos, metric.score(embedding, &entry.embedding)))
            .collect();

        // Stable: ties keep insertion order.
        scored.sort_by(|a, b| metric.rank(a.1, b.1));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(pos, score)| SearchResult::new(state.entries[pos].document(), score))
            .collect())
    }

    async fn get_document(&self, id: &str) -> Option<EmbeddedDocument> {
        let state = self.state.read().await;
        state.positions.get(id).map(|&pos| state.entries[pos].clone())
    }

    async fn get_vectors_by_document_id(&self, document_id: &str) -> Vec<EmbeddedDocument> {
        let state = self.state.read().await;
        state
            .entries
            .iter()
            .filter(|entry| StoreState::belongs_to(entry, document_id))
            .cloned()
            .collect()
    }

    async fn get_all_documents(&self) -> Vec<EmbeddedDocument> {
        self.state.read().await.entries.clone()
    }

    async fn get_document_count(&self) -> usize {
        self.state.read().await.entries.len()
    }

    async fn stats(&self) -> StoreStats {
        let state = self.state.read().await;
        let documents: HashSet<&str> =
            state.entries.iter().map(EmbeddedDocument::document_id).collect();
        StoreStats { document_count: documents.len(), vector_count: state.entries.len() }
    }

    async fn export_data(&self) -> ExportData {
        let state = self.state.read().await;
        let mut seen = HashSet::new();
        let documents = state
            .entries
            .iter()
            .filter(|entry| seen.insert(entry.document_id()))
            .map(|entry| DocumentSummary {
                id: entry.document_id().to_string(),
                metadata: entry.metadata.clone(),
            })
            .collect();
        ExportData { documents, vectors: state.entries.clone() }
    }

    async fn import_data(
        &self,
        data: ExportData,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<()> {
        let mut reporter = ProgressReporter::new(progress, data.vectors.len());
        if let Err(e) = self.validate_import(&data) {
            error!(error = %e, "rejected import payload");
            reporter.fail(&e.to_string());
            return Err(e);
        }

        reporter.start();
        let mut replacement = StoreState::default();
        for vector in data.vectors {
            let id = vector.id.clone();
            replacement.upsert(vector);
            reporter.advance(Some(&id));
        }

        let mut state = self.state.write().await;
        *state = replacement;
        self.persist(&state).await;
        info!(vector_count = state.entries.len(), "imported vector store data");
        drop(state);

        reporter.complete();
        Ok(())
    }
}
