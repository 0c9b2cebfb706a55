//! Loading markdown notes from disk.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::document::{Document, Metadata, TITLE_KEY};
use crate::error::{RagError, Result};

/// Metadata key holding the file modification time (RFC 3339).
pub const MODIFIED_KEY: &str = "modified";

const MARKDOWN_EXTENSIONS: [&str; 2] = ["md", "markdown"];

/// Whether `path` names a markdown file.
pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MARKDOWN_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m)))
}

/// Read one markdown file into a [`Document`].
///
/// The id and `source` are the path, the title is the first `#` header (or
/// the file stem), and `modified` records the file's modification time.
/// `extra` entries are merged over the derived metadata.
///
/// # Errors
///
/// Returns [`RagError::NotFound`] if the file does not exist and
/// [`RagError::Persistence`] if it cannot be read.
pub async fn load_markdown_file(path: &Path, extra: &Metadata) -> Result<Document> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RagError::NotFound(format!("file '{}'", path.display()))
        } else {
            RagError::Persistence { path: path.display().to_string(), message: e.to_string() }
        }
    })?;

    let id = path.display().to_string();
    let title = first_header(&content)
        .map(str::to_string)
        .or_else(|| path.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .unwrap_or_else(|| id.clone());

    let mut document = Document::new(id.clone(), content, id).with_metadata(TITLE_KEY, title);
    if let Ok(modified) = tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
        let modified: DateTime<Utc> = modified.into();
        document = document.with_metadata(MODIFIED_KEY, Value::String(modified.to_rfc3339()));
    }
    debug!(path = %path.display(), "loaded markdown file");
    Ok(document.with_extra_metadata(extra))
}

/// Every markdown file under `dir`, sorted by path.
///
/// # Errors
///
/// Returns [`RagError::NotFound`] if `dir` is not a directory.
pub fn collect_markdown_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RagError::NotFound(format!("directory '{}'", dir.display())));
    }
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_markdown(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    Ok(files)
}

fn first_header(content: &str) -> Option<&str> {
    content
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(str::trim)
        .filter(|title| !title.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_title_source_and_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ownership.md");
        tokio::fs::write(&path, "intro\n# Ownership in Rust\nbody").await.unwrap();

        let mut extra = Metadata::new();
        extra.insert("tags".into(), serde_json::json!(["rust"]));
        let doc = load_markdown_file(&path, &extra).await.unwrap();

        assert_eq!(doc.id, path.display().to_string());
        assert_eq!(doc.source(), Some(doc.id.as_str()));
        assert_eq!(doc.title(), Some("Ownership in Rust"));
        assert!(doc.metadata.contains_key(MODIFIED_KEY));
        assert_eq!(doc.metadata["tags"][0], "rust");
    }

    #[tokio::test]
    async fn falls_back_to_file_stem_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain-note.md");
        tokio::fs::write(&path, "no header here").await.unwrap();
        let doc = load_markdown_file(&path, &Metadata::new()).await.unwrap();
        assert_eq!(doc.title(), Some("plain-note"));

        let missing = dir.path().join("missing.md");
        let err = load_markdown_file(&missing, &Metadata::new()).await.unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
    }

    #[test]
    fn collects_markdown_respecting_recursion() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.md"), "b").unwrap();
        std::fs::write(dir.path().join("a.markdown"), "a").unwrap();
        std::fs::write(dir.path().join("skip.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("c.md"), "c").unwrap();

        let flat = collect_markdown_files(dir.path(), false).unwrap();
        assert_eq!(flat.len(), 2);
        assert!(flat[0].ends_with("a.markdown"));

        let deep = collect_markdown_files(dir.path(), true).unwrap();
        assert_eq!(deep.len(), 3);

        assert!(collect_markdown_files(&dir.path().join("nope"), true).is_err());
    }
}
