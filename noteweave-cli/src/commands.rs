//! Command execution and output rendering.
//!
//! Commands return their output as a string; `main` prints it. Progress goes
//! to stderr while long operations run.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use noteweave_rag::{
    AskOptions, CompletionOptions, DocumentRelationship, IngestSummary, Metadata, ProgressEvent,
    ProgressStatus, ProviderKind, RagError, RagResponse, SearchResult, StoreStats, VectorStore,
    export_to_file, import_from_file,
    ingest::{is_markdown, load_markdown_file},
};
use tracing::info;

use crate::app::App;
use crate::cli::Command;

/// Run one command against `app`.
///
/// # Errors
///
/// Propagates the library error; [`hint`] turns it into advice.
pub async fn execute(app: &App, command: Command) -> Result<String> {
    match command {
        Command::Add { paths, recursive } => add(app, &paths, recursive).await,
        Command::Ask { question, top_k, summary, highlight, confidence, temperature, json } => {
            let mut options = AskOptions::new(app.settings().provider)
                .with_embedding_provider(app.settings().embedding_kind())
                .with_completion(CompletionOptions { temperature, ..Default::default() });
            if let Some(k) = top_k {
                options = options.with_top_k(k);
            }
            if summary {
                options = options.with_summary();
            }
            if highlight {
                options = options.with_highlighting();
            }
            if confidence {
                options = options.with_confidence_scores();
            }
            let response = app.orchestrator().ask_question(&question, &options).await?;
            if json {
                return Ok(serde_json::to_string_pretty(&response)?);
            }
            Ok(render_response(&response))
        }
        Command::Search { query, limit, json } => {
            let results = app
                .orchestrator()
                .semantic_search(&query, limit, app.settings().embedding_kind())
                .await?;
            if json {
                return Ok(serde_json::to_string_pretty(&results)?);
            }
            Ok(render_results(&results))
        }
        Command::Related { id, min_strength, max } => {
            let related =
                app.orchestrator().get_document_relationships(&id, min_strength, max).await?;
            Ok(render_relationships(&id, &related))
        }
        Command::Remove { id, by_source } => {
            if by_source {
                let removed = app.store().remove_documents_by_source(&id).await;
                return Ok(format!("Removed {removed} entries from {id}"));
            }
            if app.store().remove_document(&id).await {
                Ok(format!("Removed {id}"))
            } else {
                Err(RagError::NotFound(format!("document '{id}'")).into())
            }
        }
        Command::List => Ok(render_list(app).await),
        Command::Stats => Ok(render_stats(app, app.store().stats().await)),
        Command::Export { path } => {
            let summary = export_to_file(app.store(), &path).await?;
            Ok(format!(
                "Exported {} documents to {} ({} bytes)",
                summary.document_count,
                summary.path.display(),
                summary.file_size
            ))
        }
        Command::Import { path } => {
            let count = import_from_file(app.store(), &path, Some(&print_progress)).await?;
            Ok(format!("Imported {count} entries from {}", path.display()))
        }
        Command::Providers => Ok(render_providers(app)),
    }
}

async fn add(app: &App, paths: &[std::path::PathBuf], recursive: bool) -> Result<String> {
    let mut total = IngestSummary::default();
    for path in paths {
        let summary = if path.is_dir() {
            app.orchestrator().ingest_directory(path, recursive, Some(&print_progress)).await?
        } else {
            add_file(app, path).await?
        };
        total.total += summary.total;
        total.successful += summary.successful;
        total.failed += summary.failed;
    }
    info!(added = total.successful, failed = total.failed, "add finished");
    Ok(format!("Added {} of {} notes ({} failed)", total.successful, total.total, total.failed))
}

async fn add_file(app: &App, path: &Path) -> Result<IngestSummary> {
    if !is_markdown(path) {
        anyhow::bail!("{} is not a markdown file", path.display());
    }
    let document = load_markdown_file(path, &Metadata::new())
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    app.orchestrator().ingest(&document, Some(&print_progress)).await?;
    Ok(IngestSummary { total: 1, successful: 1, failed: 0 })
}

fn print_progress(event: &ProgressEvent) {
    match event.status {
        ProgressStatus::Running => {
            if let Some(item) = &event.current_item {
                match &event.error {
                    Some(error) => eprintln!("[{:>3}%] {item}: {error}", event.percentage),
                    None => eprintln!("[{:>3}%] {item}", event.percentage),
                }
            }
        }
        ProgressStatus::Completed => eprintln!("[100%] done ({}/{})", event.completed, event.total),
        ProgressStatus::Failed => {
            let reason = event.error.as_deref().unwrap_or("unknown error");
            eprintln!("[{:>3}%] failed: {reason}", event.percentage);
        }
    }
}

/// Advice for an error, when there is something the user can do about it.
pub fn hint(error: &RagError) -> Option<&'static str> {
    match error {
        RagError::ProviderNotConfigured { .. } => {
            Some(
                "check your API key (OPENAI_API_KEY, ANTHROPIC_API_KEY, MISTRAL_API_KEY) \
                 or pick another --provider",
            )
        }
        RagError::EmbeddingFailed { .. } | RagError::CompletionFailed { .. } => {
            Some("check that the provider is running and reachable, and that your API key is valid")
        }
        RagError::DimensionMismatch { .. } => {
            Some(
                "the store was built with another embedding model; \
                 pass a matching --dimension or use a new --store",
            )
        }
        RagError::NotFound(_) => {
            Some("file not found or document not stored; `noteweave list` shows stored notes")
        }
        RagError::MalformedImport(_) => Some("the backup file is damaged; nothing was changed"),
        RagError::Timeout { .. } => Some("the provider is slow; raise --timeout-secs"),
        RagError::Persistence { .. } => Some("check that the store path is writable"),
        _ => None,
    }
}

/// Human-readable answer with its sources.
pub fn render_response(response: &RagResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", response.answer.trim());

    if let Some(summary) = &response.insight_summary {
        let _ = writeln!(out, "\nInsight: {summary}");
    }
    if let Some(terms) = response.key_terms.as_ref().filter(|t| !t.is_empty()) {
        let _ = writeln!(out, "\nKey terms: {}", terms.join(", "));
    }

    if response.sources.is_empty() {
        let _ = writeln!(out, "\nNo matching notes were found.");
    } else {
        let _ = writeln!(out, "\nSources:");
        for (n, source) in response.sources.iter().enumerate() {
            let label = source
                .metadata
                .get("title")
                .or_else(|| source.metadata.get("source"))
                .and_then(|v| v.as_str())
                .unwrap_or("untitled");
            let _ = writeln!(
                out,
                "  [{}] {label} ({}%, {})",
                n + 1,
                source.relevance_percentage,
                source.confidence_level
            );
            if let Some(text) = &source.highlighted_text {
                let _ = writeln!(out, "      {}", text.replace('\n', " "));
            }
        }
    }

    if let Some(confidence) = response.confidence_score {
        let _ = writeln!(out, "\nConfidence: {:.0}%", confidence * 100.0);
    }
    let _ = write!(out, "({} ms)", response.execution_time_ms);
    out
}

/// One line per search result, best first.
pub fn render_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No matching notes were found.".to_string();
    }
    let mut out = String::new();
    for (n, result) in results.iter().enumerate() {
        let relevance = result.relevance_percentage.unwrap_or_default();
        let title = result.document.title().unwrap_or(&result.document.id);
        let _ = writeln!(out, "{}. {title} ({relevance}%)", n + 1);
        if let Some(text) = &result.highlighted_text {
            let _ = writeln!(out, "   {}", text.replace('\n', " "));
        }
    }
    out.trim_end().to_string()
}

fn render_relationships(id: &str, related: &[DocumentRelationship]) -> String {
    if related.is_empty() {
        return format!("No notes related to {id}.");
    }
    let mut out = format!("Related to {id}:");
    for relationship in related {
        let _ = write!(
            out,
            "\n  {} ({:.0}%){}",
            relationship.target_id,
            relationship.strength * 100.0,
            relationship.context.as_deref().map(|c| format!(" - {c}")).unwrap_or_default()
        );
    }
    out
}

async fn render_list(app: &App) -> String {
    let exported = app.store().export_data().await;
    if exported.documents.is_empty() {
        return "The knowledge base is empty.".to_string();
    }
    let mut out = String::new();
    for document in &exported.documents {
        let title = document.metadata.get("title").and_then(|v| v.as_str()).unwrap_or("untitled");
        let _ = writeln!(out, "{}  {title}", document.id);
    }
    out.trim_end().to_string()
}

fn render_stats(app: &App, stats: StoreStats) -> String {
    let config = app.store().config();
    format!(
        "Store:      {}\nDocuments:  {}\nVectors:    {}\nDimension:  {}\nMetric:     {}",
        app.settings().store.display(),
        stats.document_count,
        stats.vector_count,
        config.dimension,
        config.similarity_metric
    )
}

fn render_providers(app: &App) -> String {
    let registry = app.orchestrator().providers();
    let mut out = String::new();
    for kind in ProviderKind::ALL {
        let status = match registry.resolve(kind) {
            Ok(_) => "ready".to_string(),
            Err(RagError::ProviderNotConfigured { reason, .. }) => reason,
            Err(e) => e.to_string(),
        };
        let marker = if kind == app.settings().provider { "*" } else { " " };
        let _ = writeln!(out, "{marker} {:<10} {status}", kind.as_str());
    }
    out.trim_end().to_string()
}
