//! # noteweave-rag
//!
//! The knowledge-base core of NoteWeave: an exact in-memory vector store,
//! similarity search under several metrics, and a retrieval-augmented
//! generation orchestrator over pluggable AI providers.
//!
//! ## Features
//!
//! - **Vector store**: upsert, removal, exact top-k search, export/import with
//!   progress, optional JSON persistence
//! - **Metrics**: cosine, euclidean and inner product, with relevance
//!   normalization and confidence buckets
//! - **RAG**: prompt assembly within a context budget, typed provider errors,
//!   timeouts and cancellation
//! - **Ingestion**: markdown files, directories and platform connectors,
//!   chunked on character boundaries
//! - **Providers**: Ollama, OpenAI, Mistral, LM Studio and Anthropic behind
//!   cargo features, plus a deterministic mock
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use noteweave_rag::{
//!     AskOptions, InMemoryVectorStore, MockProvider, ProviderKind, ProviderRegistry, RagConfig,
//!     RagOrchestrator, SimilarityMetric, Document,
//! };
//!
//! let registry = ProviderRegistry::new().with(Arc::new(MockProvider::new(64)));
//! let orchestrator = RagOrchestrator::builder()
//!     .config(RagConfig::builder().embedding_provider(ProviderKind::Mock).build()?)
//!     .providers(registry)
//!     .vector_store(Arc::new(InMemoryVectorStore::new(64, SimilarityMetric::Cosine)?))
//!     .build()?;
//!
//! let note = Document::new("rust", "Rust has ownership.", "notes/rust.md");
//! orchestrator.ingest(&note, None).await?;
//! let options = AskOptions::new(ProviderKind::Mock);
//! let response = orchestrator.ask_question("What does Rust have?", &options).await?;
//! ```

pub mod chunking;
pub mod config;
pub mod connector;
pub mod document;
pub mod error;
pub mod ingest;
pub mod inmemory;
pub mod keywords;
pub mod mock;
pub mod orchestrator;
pub mod persistence;
pub mod progress;
pub mod prompt;
pub mod provider;
pub mod relationships;
pub mod scoring;
pub mod similarity;
pub mod vectorstore;

#[cfg(any(feature = "ollama", feature = "openai", feature = "anthropic"))]
pub mod providers;

pub use chunking::{Chunker, FixedSizeChunker, MarkdownChunker, RecursiveChunker};
pub use config::{ChunkingOptions, ChunkingStrategy, RagConfig, RagConfigBuilder, VectorStoreConfig};
pub use connector::{PlatformConnector, PlatformItem, StaticConnector};
pub use document::{
    ConfidenceLevel, Document, DocumentRelationship, EmbeddedDocument, Metadata, RelationshipType,
    SearchResult,
};
pub use error::{RagError, Result};
pub use inmemory::InMemoryVectorStore;
pub use mock::MockProvider;
pub use orchestrator::{
    AskOptions, IngestSummary, RagOrchestrator, RagOrchestratorBuilder, RagResponse, SourceInfo,
    SyncResult,
};
pub use persistence::{ExportSummary, export_to_file, import_from_file};
pub use progress::{ProgressCallback, ProgressEvent, ProgressReporter, ProgressStatus};
pub use prompt::{BuiltPrompt, NO_CONTEXT_MARKER, PromptBuilder};
pub use provider::{
    AiProvider, CompletionOptions, CompletionProvider, EmbeddingProvider, ProviderKind,
    ProviderRegistry,
};
pub use relationships::find_related_documents;
pub use scoring::ConfidenceThresholds;
pub use similarity::SimilarityMetric;
pub use vectorstore::{DocumentSummary, ExportData, StoreStats, VectorStore};
