//! JSON persistence for the vector store and knowledge-base backups.
//!
//! The store file is a JSON array of [`EmbeddedDocument`] records. Backups
//! written by [`export_to_file`] use the `{documents, vectors}` object shape
//! of [`ExportData`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::document::EmbeddedDocument;
use crate::error::{RagError, Result};
use crate::progress::{ProgressCallback, ProgressReporter};
use crate::vectorstore::{ExportData, VectorStore};

/// Load persisted documents, degrading to an empty collection.
///
/// A missing file is a fresh store. An unreadable or corrupt file, or one
/// holding embeddings of the wrong length, is logged and ignored.
pub async fn load_documents(path: &Path, dimension: usize) -> Vec<EmbeddedDocument> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no persisted vector store, starting empty");
            return Vec::new();
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "failed to read vector store, starting empty"
            );
            return Vec::new();
        }
    };

    let documents: Vec<EmbeddedDocument> = match serde_json::from_str(&raw) {
        Ok(documents) => documents,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt vector store file, starting empty");
            return Vec::new();
        }
    };

    if let Some(bad) = documents.iter().find(|d| d.embedding.len() != dimension) {
        warn!(
            path = %path.display(),
            document.id = %bad.id,
            expected = dimension,
            actual = bad.embedding.len(),
            "persisted embedding has wrong dimension, starting empty"
        );
        return Vec::new();
    }

    info!(path = %path.display(), document_count = documents.len(), "loaded vector store");
    documents
}

/// Write the collection to `path`, replacing the previous file atomically.
///
/// # Errors
///
/// Returns [`RagError::Persistence`] if the directory cannot be created or
/// the file cannot be written.
pub async fn save_documents(path: &Path, documents: &[EmbeddedDocument]) -> Result<()> {
    let json = serde_json::to_string_pretty(documents).map_err(|e| persistence_error(path, e))?;
    write_atomically(path, json.as_bytes()).await
}

/// Result of writing a knowledge-base backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    /// Where the backup was written.
    pub path: PathBuf,
    /// Logical documents in the backup.
    pub document_count: usize,
    /// Size of the written file in bytes.
    pub file_size: u64,
}

/// Export the whole store to a JSON backup file, creating parent directories.
///
/// # Errors
///
/// Returns [`RagError::Persistence`] if the file cannot be written.
pub async fn export_to_file(store: &dyn VectorStore, path: &Path) -> Result<ExportSummary> {
    let data = store.export_data().await;
    let json = serde_json::to_string_pretty(&data).map_err(|e| persistence_error(path, e))?;
    write_atomically(path, json.as_bytes()).await?;

    let summary = ExportSummary {
        path: path.to_path_buf(),
        document_count: data.documents.len(),
        file_size: json.len() as u64,
    };
    info!(
        path = %path.display(),
        document_count = summary.document_count,
        "exported knowledge base"
    );
    Ok(summary)
}

/// Replace the store contents with a backup file written by [`export_to_file`].
///
/// Returns the number of imported entries.
///
/// # Errors
///
/// - [`RagError::NotFound`] if the file does not exist
/// - [`RagError::MalformedImport`] if it is not a valid backup
/// - any validation error raised by [`VectorStore::import_data`]
///
/// A `failed` progress event is emitted on every error path.
pub async fn import_from_file(
    store: &dyn VectorStore,
    path: &Path,
    progress: Option<ProgressCallback<'_>>,
) -> Result<usize> {
    let data = match read_export(path).await {
        Ok(data) => data,
        Err(e) => {
            ProgressReporter::new(progress, 0).fail(&e.to_string());
            return Err(e);
        }
    };
    let count = data.vectors.len();
    store.import_data(data, progress).await?;
    info!(path = %path.display(), vector_count = count, "imported knowledge base");
    Ok(count)
}

async fn read_export(path: &Path) -> Result<ExportData> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RagError::NotFound(format!("file '{}'", path.display()))
        } else {
            persistence_error(path, e)
        }
    })?;
    serde_json::from_str(&raw)
        .map_err(|e| RagError::MalformedImport(format!("{}: {e}", path.display())))
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await.map_err(|e| persistence_error(path, e))?;
    }
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, bytes).await.map_err(|e| persistence_error(&tmp, e))?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| persistence_error(path, e))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn persistence_error(path: &Path, e: impl std::fmt::Display) -> RagError {
    RagError::Persistence { path: path.display().to_string(), message: e.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;

    fn doc(id: &str, embedding: Vec<f32>) -> EmbeddedDocument {
        EmbeddedDocument::new(id, format!("content {id}"), embedding, Metadata::new())
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        let docs = vec![doc("a", vec![0.1, 0.2]), doc("b", vec![0.3, -0.4])];

        save_documents(&path, &docs).await.unwrap();
        assert!(!temp_path(&path).exists());
        assert_eq!(load_documents(&path, 2).await, docs);
    }

    #[tokio::test]
    async fn load_degrades_on_missing_corrupt_or_wrong_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(load_documents(&missing, 2).await.is_empty());

        let corrupt = dir.path().join("corrupt.json");
        tokio::fs::write(&corrupt, "{ not json").await.unwrap();
        assert!(load_documents(&corrupt, 2).await.is_empty());

        let wrong = dir.path().join("wrong.json");
        save_documents(&wrong, &[doc("a", vec![1.0, 2.0, 3.0])]).await.unwrap();
        assert!(load_documents(&wrong, 2).await.is_empty());
    }
}
