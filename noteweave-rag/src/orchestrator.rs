//! RAG orchestrator.
//!
//! The [`RagOrchestrator`] coordinates question answering (embed → search →
//! prompt → complete) and ingestion (chunk → embed → store) over one
//! [`VectorStore`], resolving vendors through a [`ProviderRegistry`].
//!
//! # Example
//!
//! ```rust,ignore
//! use noteweave_rag::{AskOptions, InMemoryVectorStore, ProviderKind, RagConfig, RagOrchestrator};
//!
//! let orchestrator = RagOrchestrator::builder()
//!     .config(RagConfig::builder().embedding_provider(ProviderKind::Ollama).build()?)
//!     .providers(registry)
//!     .vector_store(Arc::new(InMemoryVectorStore::new(768, SimilarityMetric::Cosine)?))
//!     .build()?;
//!
//! orchestrator.ingest(&document, None).await?;
//! let options = AskOptions::new(ProviderKind::Ollama);
//! let response = orchestrator.ask_question("What is ownership?", &options).await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::chunking::Chunker;
use crate::config::RagConfig;
use crate::connector::PlatformConnector;
use crate::document::{
    ConfidenceLevel, Document, DocumentRelationship, EmbeddedDocument, Metadata, SearchResult,
};
use crate::error::{RagError, Result};
use crate::ingest::{collect_markdown_files, load_markdown_file};
use crate::keywords::{extract_key_terms, highlighted_snippet};
use crate::progress::{ProgressCallback, ProgressReporter};
use crate::prompt::{PromptBuilder, summary_prompt};
use crate::provider::{AiProvider, CompletionOptions, ProviderKind, ProviderRegistry};
use crate::relationships::{DEFAULT_MAX_RESULTS, DEFAULT_MIN_STRENGTH, find_related_documents};
use crate::scoring::annotate;
use crate::similarity::SimilarityMetric;
use crate::vectorstore::VectorStore;

/// Per-question options.
#[derive(Debug, Clone, PartialEq)]
pub struct AskOptions {
    /// Provider generating the answer.
    pub provider: ProviderKind,
    /// Provider embedding the question. Defaults to the configured embedding
    /// provider, then to `provider`.
    pub embedding_provider: Option<ProviderKind>,
    /// Documents to retrieve. Defaults to the configured `top_k`.
    pub top_k: Option<usize>,
    /// Completion parameters, merged over the configured defaults.
    pub completion: CompletionOptions,
    /// Ask the provider for a short insight summary of the answer.
    pub enhance_with_summary: bool,
    /// Report key terms and highlight them in source snippets.
    pub highlight_keywords: bool,
    /// Report the overall confidence score.
    pub include_confidence_scores: bool,
    /// Upper bound on each provider call. Defaults to the configured timeout.
    pub timeout: Option<Duration>,
}

impl AskOptions {
    /// Options answering with `provider` and every extra disabled.
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            embedding_provider: None,
            top_k: None,
            completion: CompletionOptions::default(),
            enhance_with_summary: false,
            highlight_keywords: false,
            include_confidence_scores: false,
            timeout: None,
        }
    }

    /// Embed the question with another provider.
    pub fn with_embedding_provider(mut self, kind: ProviderKind) -> Self {
        self.embedding_provider = Some(kind);
        self
    }

    /// Retrieve `k` documents.
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    /// Set the completion parameters.
    pub fn with_completion(mut self, completion: CompletionOptions) -> Self {
        self.completion = completion;
        self
    }

    /// Request an insight summary.
    pub fn with_summary(mut self) -> Self {
        self.enhance_with_summary = true;
        self
    }

    /// Request key terms and highlighted snippets.
    pub fn with_highlighting(mut self) -> Self {
        self.highlight_keywords = true;
        self
    }

    /// Request the overall confidence score.
    pub fn with_confidence_scores(mut self) -> Self {
        self.include_confidence_scores = true;
        self
    }

    /// Bound each provider call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// One retrieved document backing an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    /// The retrieved text.
    pub content: String,
    /// The document metadata; always carries `source`.
    pub metadata: Metadata,
    /// The raw metric score.
    pub score: f32,
    /// Confidence bucket of the normalized relevance.
    pub confidence_level: ConfidenceLevel,
    /// Normalized relevance in `0..=100`.
    pub relevance_percentage: u8,
    /// Snippet with key terms emphasised.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlighted_text: Option<String>,
}

/// The structured answer to a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagResponse {
    /// The generated answer.
    pub answer: String,
    /// The documents placed in the prompt, best first.
    pub sources: Vec<SourceInfo>,
    /// Short summary of the answer, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insight_summary: Option<String>,
    /// Question terms ranked by how often the sources mention them, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_terms: Option<Vec<String>>,
    /// Mean normalized relevance of the sources, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f32>,
    /// Time spent embedding, searching and completing.
    pub execution_time_ms: u64,
}

/// Outcome of a multi-document ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    /// Documents attempted.
    pub total: usize,
    /// Documents stored.
    pub successful: usize,
    /// Documents that failed.
    pub failed: usize,
}

/// Outcome of a platform sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// The platform synced.
    pub platform: String,
    /// Items returned by the connector.
    pub fetched: usize,
    /// Items stored.
    pub ingested: usize,
    /// Items that failed to ingest.
    pub failed: usize,
}

/// The RAG orchestrator. Construct one via [`RagOrchestrator::builder()`].
pub struct RagOrchestrator {
    config: RagConfig,
    providers: ProviderRegistry,
    store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
}

impl std::fmt::Debug for RagOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagOrchestrator")
            .field("config", &self.config)
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}

impl RagOrchestrator {
    /// Create a new builder for constructing a [`RagOrchestrator`].
    pub fn builder() -> RagOrchestratorBuilder {
        RagOrchestratorBuilder::default()
    }

    /// The orchestrator configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The registered providers.
    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// The vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Answer `question` from the knowledge base.
    ///
    /// # Errors
    ///
    /// - [`RagError::ProviderNotConfigured`] if a provider is missing or lacks credentials
    /// - [`RagError::EmbeddingFailed`] / [`RagError::CompletionFailed`] on provider failure
    /// - [`RagError::DimensionMismatch`] if the question embedding does not fit the store
    /// - [`RagError::Timeout`] if a provider call exceeds the timeout
    pub async fn ask_question(&self, question: &str, options: &AskOptions) -> Result<RagResponse> {
        self.ask_question_until(question, options, std::future::pending()).await
    }

    /// [`ask_question`](Self::ask_question), aborted with [`RagError::Cancelled`]
    /// as soon as `cancel` resolves. Asking never mutates the store, so a
    /// cancelled question leaves nothing behind.
    pub async fn ask_question_until<C>(
        &self,
        question: &str,
        options: &AskOptions,
        cancel: C,
    ) -> Result<RagResponse>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            () = cancel => {
                warn!("question cancelled by caller");
                Err(RagError::Cancelled("question answering was cancelled".to_string()))
            }
            response = self.answer(question, options) => response,
        }
    }

    async fn answer(&self, question: &str, options: &AskOptions) -> Result<RagResponse> {
        let provider = self.providers.resolve(options.provider)?;
        let embedding_kind = options
            .embedding_provider
            .or(self.config.embedding_provider)
            .unwrap_or(options.provider);
        let embedder = if embedding_kind == options.provider {
            Arc::clone(&provider)
        } else {
            self.providers.resolve(embedding_kind)?
        };
        let timeout = options.timeout.or(self.config.request_timeout);

        let started = Instant::now();
        let top_k = options.top_k.unwrap_or(self.config.top_k);
        let results = self.retrieve(embedder.as_ref(), question, top_k, timeout).await?;

        let configured = self.config.context_budget_chars;
        let budget =
            provider.context_window_chars().map_or(configured, |window| window.min(configured));
        let prompt = PromptBuilder::new(budget).build(question, &results);
        if !prompt.dropped.is_empty() || !prompt.truncated.is_empty() {
            debug!(
                budget,
                dropped = prompt.dropped.len(),
                truncated = prompt.truncated.len(),
                "context exceeded prompt budget"
            );
        }

        let completion = options.completion.clone().or(&self.config.completion);
        let answer = bounded(timeout, "completion", provider.complete(&prompt.text, &completion))
            .await
            .map_err(|e| {
                error!(provider = %options.provider, error = %e, "completion failed");
                e
            })?;
        let execution_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let included: Vec<&SearchResult> =
            prompt.included.iter().map(|&pos| &results[pos]).collect();
        let key_terms = options.highlight_keywords.then(|| {
            let contents: Vec<&str> =
                included.iter().map(|r| r.document.content.as_str()).collect();
            extract_key_terms(question, &contents)
        });
        let sources: Vec<SourceInfo> =
            included.iter().map(|result| self.source_info(result, key_terms.as_deref())).collect();

        let metric = self.store.config().similarity_metric;
        let confidence_score =
            options.include_confidence_scores.then(|| mean_relevance(metric, &sources));
        let insight_summary = if options.enhance_with_summary && !sources.is_empty() {
            self.summarize(provider.as_ref(), question, &answer, &completion, timeout).await
        } else {
            None
        };

        info!(
            provider = %options.provider,
            source_count = sources.len(),
            execution_time_ms,
            "answered question"
        );
        Ok(RagResponse {
            answer,
            sources,
            insight_summary,
            key_terms,
            confidence_score,
            execution_time_ms,
        })
    }

    /// Embed `query` and return the best `limit` matches above the configured
    /// threshold, annotated with relevance and confidence.
    async fn retrieve(
        &self,
        embedder: &dyn AiProvider,
        query: &str,
        limit: usize,
        timeout: Option<Duration>,
    ) -> Result<Vec<SearchResult>> {
        let embedding = bounded(timeout, "embedding", embedder.embed(query)).await.map_err(|e| {
            error!(provider = embedder.name(), error = %e, "embedding failed during query");
            e
        })?;
        let mut results = self.store.similarity_search(&embedding, limit).await.map_err(|e| {
            error!(error = %e, "vector store search failed");
            e
        })?;

        let metric = self.store.config().similarity_metric;
        for result in &mut results {
            annotate(result, metric, &self.config.confidence);
        }
        let threshold = self.config.similarity_threshold;
        results.retain(|r| metric.normalize(r.score) >= threshold);
        Ok(results)
    }

    fn source_info(&self, result: &SearchResult, key_terms: Option<&[String]>) -> SourceInfo {
        let metric = self.store.config().similarity_metric;
        let relevance = metric.normalize(result.score);
        SourceInfo {
            content: result.document.content.clone(),
            metadata: result.document.metadata.clone(),
            score: result.score,
            confidence_level: result
                .confidence_level
                .unwrap_or_else(|| self.config.confidence.classify(relevance)),
            relevance_percentage: result.relevance_percentage.unwrap_or_default(),
            highlighted_text: key_terms
                .map(|terms| highlighted_snippet(&result.document.content, terms)),
        }
    }

    async fn summarize(
        &self,
        provider: &dyn AiProvider,
        question: &str,
        answer: &str,
        completion: &CompletionOptions,
        timeout: Option<Duration>,
    ) -> Option<String> {
        let prompt = summary_prompt(question, answer);
        match bounded(timeout, "summary", provider.complete(&prompt, completion)).await {
            Ok(summary) => Some(summary.trim().to_string()),
            Err(e) => {
                warn!(
                    provider = provider.name(),
                    error = %e,
                    "insight summary failed, answering without it"
                );
                None
            }
        }
    }

    /// Search the knowledge base without generating an answer.
    ///
    /// Results carry relevance, confidence and a snippet highlighting the
    /// query's key terms.
    ///
    /// # Errors
    ///
    /// Same provider and dimension errors as [`ask_question`](Self::ask_question).
    pub async fn semantic_search(
        &self,
        query: &str,
        limit: usize,
        provider: ProviderKind,
    ) -> Result<Vec<SearchResult>> {
        let embedder = self.providers.resolve(provider)?;
        let timeout = self.config.request_timeout;
        let mut results = self.retrieve(embedder.as_ref(), query, limit, timeout).await?;

        let contents: Vec<&str> = results.iter().map(|r| r.document.content.as_str()).collect();
        let terms = extract_key_terms(query, &contents);
        for result in &mut results {
            result.highlighted_text = Some(highlighted_snippet(&result.document.content, &terms));
        }
        info!(result_count = results.len(), "semantic search completed");
        Ok(results)
    }

    fn ingestion_provider(&self) -> Result<Arc<dyn AiProvider>> {
        let kind = self.config.embedding_provider.ok_or_else(|| {
            RagError::ConfigError(
                "an embedding provider must be configured for ingestion".to_string(),
            )
        })?;
        self.providers.resolve(kind)
    }

    /// Chunk, embed and store one document, replacing any previous version.
    ///
    /// Progress counts stored chunks. Returns the number of chunks stored.
    ///
    /// # Errors
    ///
    /// - [`RagError::ChunkingError`] if the document has no text
    /// - [`RagError::EmbeddingFailed`] if embedding fails
    /// - [`RagError::DimensionMismatch`] if the embeddings do not fit the store
    ///
    /// On error the previous version of the document is left untouched.
    pub async fn ingest(
        &self,
        document: &Document,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<usize> {
        let chunks = self.chunker.chunk(document);
        let mut reporter = ProgressReporter::new(progress, chunks.len());
        match self.store_chunks(document, chunks, &mut reporter).await {
            Ok(count) => {
                reporter.complete();
                Ok(count)
            }
            Err(e) => {
                error!(document.id = %document.id, error = %e, "ingestion failed");
                reporter.fail(&e.to_string());
                Err(e)
            }
        }
    }

    async fn store_chunks(
        &self,
        document: &Document,
        chunks: Vec<Document>,
        reporter: &mut ProgressReporter<'_>,
    ) -> Result<usize> {
        if chunks.is_empty() {
            return Err(RagError::ChunkingError(format!(
                "document '{}' has no text to index",
                document.id
            )));
        }
        let embedder = self.ingestion_provider()?;
        reporter.start();

        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let embeddings =
            bounded(self.config.request_timeout, "embedding", embedder.embed_batch(&texts))
                .await?;
        if embeddings.len() != chunks.len() {
            return Err(RagError::EmbeddingFailed {
                provider: embedder.name().to_string(),
                message: format!("expected {} embeddings, got {}", chunks.len(), embeddings.len()),
            });
        }

        let dimension = self.store.config().dimension;
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(RagError::DimensionMismatch { expected: dimension, actual: bad.len() });
        }

        let embedded: Vec<EmbeddedDocument> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| chunk.with_embedding(embedding))
            .collect();
        let ids: Vec<String> = embedded.iter().map(|d| d.id.clone()).collect();

        self.store.replace_document(&document.id, embedded).await?;
        for id in &ids {
            reporter.advance(Some(id));
        }

        info!(document.id = %document.id, chunk_count = ids.len(), "ingested document");
        Ok(ids.len())
    }

    /// Ingest several documents. A failing document is counted and skipped.
    pub async fn ingest_batch(
        &self,
        documents: &[Document],
        progress: Option<ProgressCallback<'_>>,
    ) -> IngestSummary {
        let mut reporter = ProgressReporter::new(progress, documents.len());
        reporter.start();
        let mut summary = IngestSummary { total: documents.len(), ..Default::default() };

        for document in documents {
            reporter.working_on(&document.id);
            match self.ingest(document, None).await {
                Ok(_) => {
                    summary.successful += 1;
                    reporter.advance(Some(&document.id));
                }
                Err(e) => {
                    summary.failed += 1;
                    reporter.advance_with_error(Some(&document.id), &e.to_string());
                }
            }
        }

        reporter.complete();
        info!(
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            "batch ingestion finished"
        );
        summary
    }

    /// Ingest every markdown file under `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotFound`] if `dir` does not exist. Individual file
    /// failures are counted in the summary.
    pub async fn ingest_directory(
        &self,
        dir: &Path,
        recursive: bool,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<IngestSummary> {
        let files = match collect_markdown_files(dir, recursive) {
            Ok(files) => files,
            Err(e) => {
                ProgressReporter::new(progress, 0).fail(&e.to_string());
                return Err(e);
            }
        };

        let mut reporter = ProgressReporter::new(progress, files.len());
        reporter.start();
        let mut summary = IngestSummary { total: files.len(), ..Default::default() };

        for path in &files {
            let item = path.display().to_string();
            reporter.working_on(&item);
            let outcome = match load_markdown_file(path, &Metadata::new()).await {
                Ok(document) => self.ingest(&document, None).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(_) => {
                    summary.successful += 1;
                    reporter.advance(Some(&item));
                }
                Err(e) => {
                    warn!(path = %item, error = %e, "skipping file");
                    summary.failed += 1;
                    reporter.advance_with_error(Some(&item), &e.to_string());
                }
            }
        }

        reporter.complete();
        info!(
            dir = %dir.display(),
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            "directory ingestion finished"
        );
        Ok(summary)
    }

    /// Fetch every item from `connector` and ingest it.
    ///
    /// # Errors
    ///
    /// Returns the connector's error if fetching fails; nothing is ingested.
    pub async fn sync_platform(
        &self,
        connector: &dyn PlatformConnector,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<SyncResult> {
        let platform = connector.platform().to_string();
        let items = match connector.fetch_items(None).await {
            Ok(items) => items,
            Err(e) => {
                error!(platform = %platform, error = %e, "platform fetch failed");
                ProgressReporter::new(progress, 0).fail(&e.to_string());
                return Err(e);
            }
        };

        let documents: Vec<Document> =
            items.into_iter().map(|item| item.into_document(&platform)).collect();
        let summary = self.ingest_batch(&documents, progress).await;
        info!(
            platform = %platform,
            fetched = documents.len(),
            ingested = summary.successful,
            "platform sync finished"
        );
        Ok(SyncResult {
            platform,
            fetched: documents.len(),
            ingested: summary.successful,
            failed: summary.failed,
        })
    }

    /// Documents related to `document_id`, strongest first.
    ///
    /// Defaults to a minimum strength of 0.7 and at most 10 results.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotFound`] if the document is not stored.
    pub async fn get_document_relationships(
        &self,
        document_id: &str,
        min_strength: Option<f32>,
        max_results: Option<usize>,
    ) -> Result<Vec<DocumentRelationship>> {
        find_related_documents(
            self.store.as_ref(),
            document_id,
            min_strength.unwrap_or(DEFAULT_MIN_STRENGTH),
            max_results.unwrap_or(DEFAULT_MAX_RESULTS),
        )
        .await
    }
}

/// Run `call`, failing with [`RagError::Timeout`] once `timeout` elapses.
async fn bounded<T>(
    timeout: Option<Duration>,
    operation: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
            warn!(operation, timeout_ms = limit.as_millis() as u64, "provider call timed out");
            RagError::Timeout {
                operation: operation.to_string(),
                after_ms: limit.as_millis() as u64,
            }
        })?,
        None => call.await,
    }
}

fn mean_relevance(metric: SimilarityMetric, sources: &[SourceInfo]) -> f32 {
    if sources.is_empty() {
        return 0.0;
    }
    let total: f32 = sources.iter().map(|s| metric.normalize(s.score)).sum();
    total / sources.len() as f32
}

/// Builder for constructing a [`RagOrchestrator`].
///
/// `config` and `vector_store` are required. Without an explicit chunker the
/// one described by `config.chunking` is used.
#[derive(Default)]
pub struct RagOrchestratorBuilder {
    config: Option<RagConfig>,
    providers: ProviderRegistry,
    store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl RagOrchestratorBuilder {
    /// Set the orchestrator configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the provider registry.
    pub fn providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = providers;
        self
    }

    /// Set the vector store.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`RagOrchestrator`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing.
    pub fn build(self) -> Result<RagOrchestrator> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| config.chunking.chunker());
        Ok(RagOrchestrator { config, providers: self.providers, store, chunker })
    }
}
