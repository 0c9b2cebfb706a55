//! End-to-end behaviour of the RAG orchestrator against the mock provider.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use noteweave_rag::document::{DOCUMENT_ID_KEY, Metadata, SOURCE_KEY, TITLE_KEY};
use noteweave_rag::prompt::TRUNCATION_MARKER;
use noteweave_rag::{
    AskOptions, Document, EmbeddedDocument, InMemoryVectorStore, MockProvider, NO_CONTEXT_MARKER,
    PlatformItem, ProgressEvent, ProgressStatus, ProviderKind, ProviderRegistry, RagConfig,
    RagError, RagOrchestrator, SimilarityMetric, StaticConnector, VectorStore,
};
use serde_json::json;

const QUESTION: &str = "How does ownership work?";

fn note(id: &str, title: &str, content: &str, embedding: Vec<f32>) -> EmbeddedDocument {
    let mut metadata = Metadata::new();
    metadata.insert(SOURCE_KEY.into(), json!(format!("notes/{id}.md")));
    metadata.insert(TITLE_KEY.into(), json!(title));
    EmbeddedDocument::new(id, content, embedding, metadata)
}

fn orchestrator(
    mock: Arc<MockProvider>,
    store: Arc<InMemoryVectorStore>,
    config: RagConfig,
) -> RagOrchestrator {
    RagOrchestrator::builder()
        .config(config)
        .providers(ProviderRegistry::new().with(mock))
        .vector_store(store)
        .build()
        .unwrap()
}

fn mock_config() -> RagConfig {
    RagConfig::builder().embedding_provider(ProviderKind::Mock).build().unwrap()
}

/// A three-dimensional knowledge base where the question points straight at
/// the ownership note.
async fn seeded() -> (Arc<MockProvider>, Arc<InMemoryVectorStore>) {
    let mock = Arc::new(
        MockProvider::new(3)
            .with_answer("Values have one owner.")
            .with_embedding(QUESTION, vec![1.0, 0.0, 0.0]),
    );
    let store = Arc::new(InMemoryVectorStore::new(3, SimilarityMetric::Cosine).unwrap());
    store
        .add_documents(vec![
            note(
                "ownership",
                "Ownership",
                "Rust ownership gives every value a single owner.",
                vec![1.0, 0.0, 0.0],
            ),
            note(
                "borrowing",
                "Borrowing",
                "Borrowing lends access without taking ownership.",
                vec![0.8, 0.6, 0.0],
            ),
            note("tomatoes", "Tomatoes", "Water tomatoes in the morning.", vec![0.0, 0.0, 1.0]),
        ])
        .await
        .unwrap();
    (mock, store)
}

fn recorder() -> (Arc<Mutex<Vec<ProgressEvent>>>, impl Fn(&ProgressEvent) + Send + Sync) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    (events, move |e: &ProgressEvent| sink.lock().unwrap().push(e.clone()))
}

#[tokio::test]
async fn empty_knowledge_base_prompts_with_no_context_marker() {
    let mock = Arc::new(MockProvider::new(8));
    let store = Arc::new(InMemoryVectorStore::new(8, SimilarityMetric::Cosine).unwrap());
    let rag = orchestrator(mock.clone(), store, mock_config());

    let options = AskOptions::new(ProviderKind::Mock);
    let response = rag.ask_question("What is Rust?", &options).await.unwrap();
    assert!(response.sources.is_empty());
    assert_eq!(response.answer, "This is a mock answer.");

    let prompts = mock.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(NO_CONTEXT_MARKER));
    assert!(prompts[0].contains("What is Rust?"));
}

#[tokio::test]
async fn answers_with_ranked_sources() {
    let (mock, store) = seeded().await;
    let rag = orchestrator(mock.clone(), store, mock_config());

    let options = AskOptions::new(ProviderKind::Mock).with_top_k(2).with_confidence_scores();
    let response = rag.ask_question(QUESTION, &options).await.unwrap();

    assert_eq!(response.answer, "Values have one owner.");
    assert_eq!(response.sources.len(), 2);
    assert_eq!(response.sources[0].metadata[TITLE_KEY], "Ownership");
    assert_eq!(response.sources[1].metadata[TITLE_KEY], "Borrowing");
    assert!(response.sources[0].score >= response.sources[1].score);
    assert_eq!(response.sources[0].relevance_percentage, 100);
    assert_eq!(response.sources[1].relevance_percentage, 80);
    assert!(response.key_terms.is_none());
    assert!(response.insight_summary.is_none());

    let confidence = response.confidence_score.unwrap();
    assert!((confidence - 0.9).abs() < 1e-4);

    let prompt = &mock.prompts()[0];
    assert!(prompt.contains("[1] Ownership (notes/ownership.md)"));
    assert!(prompt.contains("[2] Borrowing (notes/borrowing.md)"));
    assert!(!prompt.contains("tomatoes"));
}

#[tokio::test]
async fn highlighting_and_summary_are_opt_in() {
    let (mock, store) = seeded().await;
    let rag = orchestrator(mock, store, mock_config());

    let options =
        AskOptions::new(ProviderKind::Mock).with_top_k(2).with_highlighting().with_summary();
    let response = rag.ask_question(QUESTION, &options).await.unwrap();

    let key_terms = response.key_terms.unwrap();
    assert_eq!(key_terms, vec!["ownership", "work"]);
    let snippet = response.sources[0].highlighted_text.as_deref().unwrap();
    assert!(snippet.contains("**ownership**"));
    assert_eq!(response.insight_summary.as_deref(), Some("Values have one owner."));
}

#[tokio::test]
async fn similarity_threshold_filters_weak_sources() {
    let (mock, store) = seeded().await;
    let config = RagConfig::builder()
        .embedding_provider(ProviderKind::Mock)
        .similarity_threshold(0.9)
        .build()
        .unwrap();
    let rag = orchestrator(mock, store, config);

    let options = AskOptions::new(ProviderKind::Mock).with_top_k(3);
    let response = rag.ask_question(QUESTION, &options).await.unwrap();
    assert_eq!(response.sources.len(), 1);
    assert_eq!(response.sources[0].metadata[TITLE_KEY], "Ownership");
}

#[tokio::test]
async fn small_context_window_keeps_only_the_best_source() {
    let (_, store) = seeded().await;
    let mock = Arc::new(
        MockProvider::new(3)
            .with_embedding(QUESTION, vec![1.0, 0.0, 0.0])
            .with_context_window_chars(10),
    );
    let rag = orchestrator(mock.clone(), store, mock_config());

    let response = rag.ask_question(QUESTION, &AskOptions::new(ProviderKind::Mock)).await.unwrap();
    assert_eq!(response.sources.len(), 1);
    assert_eq!(response.sources[0].metadata[TITLE_KEY], "Ownership");

    let prompt = &mock.prompts()[0];
    assert!(!prompt.contains(NO_CONTEXT_MARKER));
    assert!(prompt.contains(&format!("Rust owner{TRUNCATION_MARKER}")));
    assert!(!prompt.contains("Borrowing lends"));
}

#[tokio::test]
async fn provider_failures_are_typed() {
    let (_, store) = seeded().await;

    let embed_fail = Arc::new(MockProvider::new(3).failing_embeddings("model not loaded"));
    let rag = orchestrator(embed_fail, store.clone(), mock_config());
    let err = rag.ask_question(QUESTION, &AskOptions::new(ProviderKind::Mock)).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingFailed { .. }), "got {err:?}");

    let complete_fail = Arc::new(
        MockProvider::new(3)
            .with_embedding(QUESTION, vec![1.0, 0.0, 0.0])
            .failing_completions("overloaded"),
    );
    let rag = orchestrator(complete_fail, store.clone(), mock_config());
    let err = rag.ask_question(QUESTION, &AskOptions::new(ProviderKind::Mock)).await.unwrap_err();
    assert!(matches!(err, RagError::CompletionFailed { .. }), "got {err:?}");

    let no_key = Arc::new(MockProvider::new(3).without_credentials());
    let rag = orchestrator(no_key.clone(), store.clone(), mock_config());
    let err = rag.ask_question(QUESTION, &AskOptions::new(ProviderKind::Mock)).await.unwrap_err();
    assert!(matches!(err, RagError::ProviderNotConfigured { .. }), "got {err:?}");
    assert!(no_key.prompts().is_empty());

    let (mock, _) = seeded().await;
    let rag = orchestrator(mock, store, mock_config());
    let err = rag.ask_question(QUESTION, &AskOptions::new(ProviderKind::OpenAI)).await.unwrap_err();
    assert!(matches!(err, RagError::ProviderNotConfigured { .. }), "got {err:?}");
}

#[tokio::test]
async fn question_embedding_must_match_store_dimension() {
    let (_, store) = seeded().await;
    let mock = Arc::new(MockProvider::new(5));
    let rag = orchestrator(mock, store, mock_config());
    let err = rag.ask_question(QUESTION, &AskOptions::new(ProviderKind::Mock)).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 5 }));
}

#[tokio::test(start_paused = true)]
async fn slow_provider_times_out() {
    let (_, store) = seeded().await;
    let mock = Arc::new(MockProvider::new(3).with_delay(Duration::from_secs(30)));
    let rag = orchestrator(mock.clone(), store, mock_config());

    let options = AskOptions::new(ProviderKind::Mock).with_timeout(Duration::from_secs(2));
    let err = rag.ask_question(QUESTION, &options).await.unwrap_err();
    assert!(matches!(
        err,
        RagError::Timeout { ref operation, after_ms: 2000 } if operation == "embedding"
    ));
    assert!(mock.prompts().is_empty());
}

#[tokio::test]
async fn cancelled_question_returns_cancelled() {
    let (mock, store) = seeded().await;
    let rag = orchestrator(mock.clone(), store.clone(), mock_config());

    let err = rag
        .ask_question_until(QUESTION, &AskOptions::new(ProviderKind::Mock), std::future::ready(()))
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Cancelled(_)));
    assert!(mock.prompts().is_empty());
    assert_eq!(store.get_document_count().await, 3);
}

#[tokio::test]
async fn semantic_search_annotates_results() {
    let (mock, store) = seeded().await;
    let rag = orchestrator(mock, store, mock_config());

    let results = rag.semantic_search(QUESTION, 2, ProviderKind::Mock).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].document.id, "ownership");
    assert_eq!(results[0].relevance_percentage, Some(100));
    assert!(results[0].confidence_level.is_some());
    assert!(results[0].highlighted_text.as_deref().unwrap().contains("**ownership**"));
}

#[tokio::test]
async fn ingest_chunks_embeds_and_replaces() {
    let mock = Arc::new(MockProvider::new(64));
    let store = Arc::new(InMemoryVectorStore::new(64, SimilarityMetric::Cosine).unwrap());
    let rag = orchestrator(mock, store.clone(), mock_config());

    let document =
        Document::new("notes/rust.md", "Rust has ownership and borrowing.", "notes/rust.md");
    let (events, callback) = recorder();
    assert_eq!(rag.ingest(&document, Some(&callback)).await.unwrap(), 1);

    let stored = store.get_vectors_by_document_id("notes/rust.md").await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].metadata[DOCUMENT_ID_KEY], "notes/rust.md");
    assert_eq!(stored[0].embedding.len(), 64);

    let events = events.lock().unwrap().clone();
    assert_eq!(events.last().unwrap().status, ProgressStatus::Completed);
    assert_eq!(events.iter().filter(|e| e.status.is_terminal()).count(), 1);

    // Re-ingesting replaces rather than duplicates.
    let updated = Document::new("notes/rust.md", "Rust has lifetimes.", "notes/rust.md");
    rag.ingest(&updated, None).await.unwrap();
    let stored = store.get_vectors_by_document_id("notes/rust.md").await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "Rust has lifetimes.");
}

#[tokio::test]
async fn ingest_errors_leave_store_untouched() {
    let store = Arc::new(InMemoryVectorStore::new(16, SimilarityMetric::Cosine).unwrap());
    let rag = orchestrator(Arc::new(MockProvider::new(16)), store.clone(), mock_config());
    rag.ingest(&Document::new("a", "original text", "a.md"), None).await.unwrap();

    let (events, callback) = recorder();
    let empty = Document::new("empty", "   \n", "empty.md");
    let err = rag.ingest(&empty, Some(&callback)).await.unwrap_err();
    assert!(matches!(err, RagError::ChunkingError(_)));
    assert_eq!(events.lock().unwrap().last().unwrap().status, ProgressStatus::Failed);

    let down = Arc::new(MockProvider::new(16).failing_embeddings("down"));
    let failing = orchestrator(down, store.clone(), mock_config());
    let err = failing.ingest(&Document::new("a", "replacement", "a.md"), None).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingFailed { .. }));
    assert_eq!(store.get_vectors_by_document_id("a").await[0].content, "original text");

    let wrong_dim = orchestrator(Arc::new(MockProvider::new(8)), store.clone(), mock_config());
    let err = wrong_dim.ingest(&Document::new("a", "replacement", "a.md"), None).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 16, actual: 8 }));

    let unconfigured =
        orchestrator(Arc::new(MockProvider::new(16)), store.clone(), RagConfig::default());
    let err = unconfigured.ingest(&Document::new("b", "text", "b.md"), None).await.unwrap_err();
    assert!(matches!(err, RagError::ConfigError(_)));
    assert_eq!(store.get_document_count().await, 1);
}

#[tokio::test]
async fn batch_ingestion_counts_failures() {
    let store = Arc::new(InMemoryVectorStore::new(16, SimilarityMetric::Cosine).unwrap());
    let rag = orchestrator(Arc::new(MockProvider::new(16)), store.clone(), mock_config());

    let documents = vec![
        Document::new("one", "first note", "one.md"),
        Document::new("blank", "", "blank.md"),
        Document::new("two", "second note", "two.md"),
    ];
    let (events, callback) = recorder();
    let summary = rag.ingest_batch(&documents, Some(&callback)).await;
    assert_eq!((summary.total, summary.successful, summary.failed), (3, 2, 1));
    assert_eq!(store.stats().await.document_count, 2);

    let events = events.lock().unwrap().clone();
    assert!(events.iter().any(|e| e.current_item.as_deref() == Some("blank") && e.error.is_some()));
    let completed: Vec<usize> = events.iter().map(|e| e.completed).collect();
    assert!(completed.windows(2).all(|w| w[0] <= w[1]));
    let last = events.last().unwrap();
    assert_eq!((last.status, last.completed, last.percentage), (ProgressStatus::Completed, 3, 100));
}

#[tokio::test]
async fn directory_ingestion_reads_markdown_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rust.md"), "# Rust\nOwnership and borrowing.").unwrap();
    std::fs::write(dir.path().join("empty.md"), "").unwrap();
    std::fs::write(dir.path().join("ignored.txt"), "not markdown").unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    std::fs::write(dir.path().join("nested").join("go.md"), "# Go\nGoroutines.").unwrap();

    let store = Arc::new(InMemoryVectorStore::new(32, SimilarityMetric::Cosine).unwrap());
    let rag = orchestrator(Arc::new(MockProvider::new(32)), store.clone(), mock_config());

    let flat = rag.ingest_directory(dir.path(), false, None).await.unwrap();
    assert_eq!((flat.total, flat.successful, flat.failed), (2, 1, 1));

    let deep = rag.ingest_directory(dir.path(), true, None).await.unwrap();
    assert_eq!((deep.total, deep.successful, deep.failed), (3, 2, 1));
    assert_eq!(store.stats().await.document_count, 2);

    let rust_id = dir.path().join("rust.md").display().to_string();
    let rust = store.get_vectors_by_document_id(&rust_id).await;
    assert_eq!(rust[0].metadata[TITLE_KEY], "Rust");

    let (events, callback) = recorder();
    let missing = dir.path().join("missing");
    let err = rag.ingest_directory(&missing, true, Some(&callback)).await.unwrap_err();
    assert!(matches!(err, RagError::NotFound(_)));
    assert_eq!(events.lock().unwrap().last().unwrap().status, ProgressStatus::Failed);
}

#[tokio::test]
async fn platform_sync_ingests_prefixed_documents() {
    let store = Arc::new(InMemoryVectorStore::new(32, SimilarityMetric::Cosine).unwrap());
    let rag = orchestrator(Arc::new(MockProvider::new(32)), store.clone(), mock_config());

    let connector = StaticConnector::new("notion", vec![
        PlatformItem::new("page-1", "Roadmap", "Ship the sync feature."),
        PlatformItem::new("page-2", "Retro", "What went well this sprint."),
        PlatformItem::new("page-3", "Blank", ""),
    ]);
    let result = rag.sync_platform(&connector, None).await.unwrap();
    assert_eq!(result.platform, "notion");
    assert_eq!((result.fetched, result.ingested, result.failed), (3, 2, 1));

    let roadmap = store.get_vectors_by_document_id("notion:page-1").await;
    assert_eq!(roadmap.len(), 1);
    assert_eq!(roadmap[0].metadata["platform"], "notion");
    assert_eq!(roadmap[0].metadata[TITLE_KEY], "Roadmap");
}

#[tokio::test]
async fn relationships_exclude_self_and_rank_by_strength() {
    let (mock, store) = seeded().await;
    let rag = orchestrator(mock, store, mock_config());

    let related = rag.get_document_relationships("ownership", None, None).await.unwrap();
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].target_id, "borrowing");
    assert!((related[0].strength - 0.8).abs() < 1e-4);

    let everything = rag.get_document_relationships("ownership", Some(0.0), None).await.unwrap();
    let targets: Vec<&str> = everything.iter().map(|r| r.target_id.as_str()).collect();
    assert_eq!(targets, vec!["borrowing", "tomatoes"]);

    let capped = rag.get_document_relationships("ownership", Some(0.0), Some(1)).await.unwrap();
    assert_eq!(capped.len(), 1);

    let err = rag.get_document_relationships("missing", None, None).await.unwrap_err();
    assert!(matches!(err, RagError::NotFound(_)));
}

#[test]
fn builder_requires_config_and_store() {
    let err = RagOrchestrator::builder().config(RagConfig::default()).build().unwrap_err();
    assert!(matches!(err, RagError::ConfigError(_)));

    let store: Arc<dyn VectorStore> =
        Arc::new(InMemoryVectorStore::new(4, SimilarityMetric::Cosine).unwrap());
    let err = RagOrchestrator::builder().vector_store(store).build().unwrap_err();
    assert!(matches!(err, RagError::ConfigError(_)));
}
