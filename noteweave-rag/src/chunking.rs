//! Splitting notes into embeddable chunks.
//!
//! Three [`Chunker`]s share the same sizing knobs (`chunk_size`,
//! `chunk_overlap`, `min_chunk_size`):
//!
//! - [`FixedSizeChunker`]: plain character windows
//! - [`RecursiveChunker`]: paragraph, then sentence, then word boundaries
//! - [`MarkdownChunker`]: one chunk per header section, recording `header_path`
//!
//! All sizes count characters, so Thai or CJK text is never cut inside a
//! code point.

use serde_json::Value;

use crate::document::{CHUNK_INDEX_KEY, DOCUMENT_ID_KEY, Document};

/// Metadata key recording the markdown header hierarchy of a chunk.
pub const HEADER_PATH_KEY: &str = "header_path";

/// Boundaries tried in order when a piece is too long.
const BOUNDARIES: [&str; 5] = ["\n\n", ". ", "! ", "? ", " "];

/// Splits a [`Document`] into smaller documents.
///
/// Chunk ids are `{document_id}_{index}`. Each chunk keeps the parent's
/// metadata and adds `document_id` and `chunk_index`.
pub trait Chunker: Send + Sync {
    /// The chunks of `document`, empty when it has no visible text.
    fn chunk(&self, document: &Document) -> Vec<Document>;
}

#[derive(Debug, Clone, Copy)]
struct Sizing {
    size: usize,
    overlap: usize,
    min: usize,
}

impl Sizing {
    fn new(size: usize, overlap: usize) -> Self {
        Self { size: size.max(1), overlap, min: 0 }
    }

    fn windows(&self, len: usize) -> Vec<(usize, usize)> {
        let step = self.size.saturating_sub(self.overlap).max(1);
        let mut windows = Vec::new();
        let mut start = 0;
        while start < len {
            let end = (start + self.size).min(len);
            windows.push((start, end));
            if end == len {
                break;
            }
            start += step;
        }
        windows
    }

    fn char_windows(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        self.windows(chars.len())
            .into_iter()
            .map(|(start, end)| chars[start..end].iter().collect())
            .collect()
    }

    /// Cut `text` at the first boundary, greedily pack the pieces up to
    /// `size`, and recurse with the finer boundaries on anything still too
    /// long. Character windows are the last resort.
    fn pack(&self, text: &str, boundaries: &[&str]) -> Vec<String> {
        let Some((&boundary, finer)) = boundaries.split_first() else {
            return self.char_windows(text);
        };
        if char_len(text) <= self.size {
            return vec![text.to_string()];
        }

        let mut packed = Vec::new();
        let mut buffer = String::new();
        let mut buffer_len = 0;
        for piece in split_after(text, boundary) {
            let piece_len = char_len(piece);
            if !buffer.is_empty() && buffer_len + piece_len > self.size {
                self.emit(std::mem::take(&mut buffer), buffer_len, finer, &mut packed);
                buffer_len = 0;
            }
            buffer.push_str(piece);
            buffer_len += piece_len;
        }
        self.emit(buffer, buffer_len, finer, &mut packed);
        packed
    }

    fn emit(&self, buffer: String, len: usize, finer: &[&str], out: &mut Vec<String>) {
        if len > self.size {
            out.extend(self.pack(&buffer, finer));
        } else if !buffer.is_empty() {
            out.push(buffer);
        }
    }
}

/// Fixed character windows advancing by `chunk_size - chunk_overlap`.
///
/// ```rust,ignore
/// use noteweave_rag::{Chunker, FixedSizeChunker};
///
/// let chunks = FixedSizeChunker::new(256, 32).chunk(&note);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    sizing: Sizing,
}

impl FixedSizeChunker {
    /// Windows of `chunk_size` characters sharing `chunk_overlap` characters.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { sizing: Sizing::new(chunk_size, chunk_overlap) }
    }

    /// Fold a trailing window shorter than `min_chunk_size` into the one before it.
    pub fn with_min_chunk_size(mut self, min_chunk_size: usize) -> Self {
        self.sizing.min = min_chunk_size;
        self
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Document> {
        if document.content.trim().is_empty() {
            return Vec::new();
        }
        let chars: Vec<char> = document.content.chars().collect();
        let mut windows: Vec<(usize, usize)> = Vec::new();
        for (start, end) in self.sizing.windows(chars.len()) {
            match windows.last_mut() {
                // Windows overlap or touch, so stretching the previous one
                // keeps the text contiguous.
                Some(prev) if end - start < self.sizing.min => prev.1 = end,
                _ => windows.push((start, end)),
            }
        }
        let pieces: Vec<(String, Option<String>)> =
            windows.into_iter().map(|(s, e)| (chars[s..e].iter().collect(), None)).collect();
        build_chunks(document, pieces)
    }
}

/// Keeps paragraphs together when they fit, falling back to sentences,
/// then words, then raw character windows.
///
/// `chunk_overlap` only applies to that last fallback.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    sizing: Sizing,
}

impl RecursiveChunker {
    /// Chunks of at most `chunk_size` characters.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { sizing: Sizing::new(chunk_size, chunk_overlap) }
    }

    /// Append chunks shorter than `min_chunk_size` to their predecessor.
    pub fn with_min_chunk_size(mut self, min_chunk_size: usize) -> Self {
        self.sizing.min = min_chunk_size;
        self
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Document> {
        if document.content.trim().is_empty() {
            return Vec::new();
        }
        let mut merged: Vec<String> = Vec::new();
        for piece in self.sizing.pack(&document.content, &BOUNDARIES) {
            match merged.last_mut() {
                Some(prev) if char_len(&piece) < self.sizing.min => prev.push_str(&piece),
                _ => merged.push(piece),
            }
        }
        build_chunks(document, merged.into_iter().map(|text| (text, None)).collect())
    }
}

/// One chunk per markdown section, prefixed with its header trail
/// (`Rust > Ownership`). Oversized sections are packed like
/// [`RecursiveChunker`].
///
/// Only ATX headers (`#` to `######` followed by a space) start a section, so
/// `#tags` and `#` lines inside fenced code stay in the body.
#[derive(Debug, Clone)]
pub struct MarkdownChunker {
    sizing: Sizing,
}

impl MarkdownChunker {
    /// Sections of at most `chunk_size` characters.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { sizing: Sizing::new(chunk_size, chunk_overlap) }
    }

    /// Append chunks shorter than `min_chunk_size` to their predecessor.
    pub fn with_min_chunk_size(mut self, min_chunk_size: usize) -> Self {
        self.sizing.min = min_chunk_size;
        self
    }
}

impl Chunker for MarkdownChunker {
    fn chunk(&self, document: &Document) -> Vec<Document> {
        if document.content.trim().is_empty() {
            return Vec::new();
        }

        let mut pieces: Vec<(String, Option<String>)> = Vec::new();
        for (trail, body) in sections(&document.content) {
            let text = match (trail.is_empty(), body.is_empty()) {
                (true, _) => body,
                (false, true) => trail.clone(),
                (false, false) => format!("{trail}\n{body}"),
            };
            if text.trim().is_empty() {
                continue;
            }

            for part in self.sizing.pack(&text, &BOUNDARIES) {
                match pieces.last_mut() {
                    Some((prev, _)) if char_len(&part) < self.sizing.min => {
                        prev.push_str("\n\n");
                        prev.push_str(&part);
                    }
                    _ => pieces.push((part, Some(trail.clone()).filter(|t| !t.is_empty()))),
                }
            }
        }
        build_chunks(document, pieces)
    }
}

/// Level and title of an ATX header line.
fn header(line: &str) -> Option<(usize, &str)> {
    let line = line.trim_start();
    let level = line.bytes().take_while(|&b| b == b'#').count();
    let title = line.get(level..)?;
    let spaced = title.is_empty() || title.starts_with(char::is_whitespace);
    let valid = (1..=6).contains(&level) && spaced;
    valid.then(|| (level, title.trim()))
}

/// `(header trail, trimmed body)` for every section of `text`.
fn sections(text: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut trail: Vec<String> = Vec::new();
    let mut body: Vec<&str> = Vec::new();
    let mut in_fence = false;

    let mut close = |trail: &[String], body: &mut Vec<&str>| {
        let text = body.join("\n").trim().to_string();
        body.clear();
        if !text.is_empty() {
            out.push((trail.join(" > "), text));
        }
    };

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        match header(line).filter(|_| !in_fence) {
            Some((level, title)) => {
                close(&trail, &mut body);
                trail.truncate(level - 1);
                trail.push(title.to_string());
            }
            None => body.push(line),
        }
    }
    close(&trail, &mut body);
    // A note made only of headers still says something.
    if out.is_empty() && !trail.is_empty() {
        out.push((trail.join(" > "), String::new()));
    }
    out
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Attach the parent's metadata to each non-blank piece.
fn build_chunks(document: &Document, pieces: Vec<(String, Option<String>)>) -> Vec<Document> {
    pieces
        .into_iter()
        .filter(|(text, _)| !text.trim().is_empty())
        .enumerate()
        .map(|(index, (content, header_path))| {
            let mut metadata = document.metadata.clone();
            metadata.insert(DOCUMENT_ID_KEY.to_string(), Value::String(document.id.clone()));
            metadata.insert(CHUNK_INDEX_KEY.to_string(), Value::from(index));
            if let Some(path) = header_path {
                metadata.insert(HEADER_PATH_KEY.to_string(), Value::String(path));
            }
            Document { id: format!("{}_{index}", document.id), content, metadata }
        })
        .collect()
}

/// Pieces of `text` each ending just after an occurrence of `boundary`
/// (except possibly the last).
fn split_after<'a>(text: &'a str, boundary: &str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find(boundary) {
        let (piece, tail) = rest.split_at(pos + boundary.len());
        pieces.push(piece);
        rest = tail;
    }
    if !rest.is_empty() {
        pieces.push(rest);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SOURCE_KEY;

    fn doc(content: &str) -> Document {
        Document::new("doc", content, "notes/doc.md")
    }

    #[test]
    fn short_document_yields_one_chunk() {
        let chunks = RecursiveChunker::new(100, 10).chunk(&doc("A short note."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "doc_0");
        assert_eq!(chunks[0].document_id(), "doc");
        assert_eq!(chunks[0].metadata[CHUNK_INDEX_KEY], 0);
        assert_eq!(chunks[0].metadata[SOURCE_KEY], "notes/doc.md");
    }

    #[test]
    fn empty_document_yields_nothing() {
        assert!(FixedSizeChunker::new(10, 2).chunk(&doc("  \n ")).is_empty());
        assert!(MarkdownChunker::new(10, 2).chunk(&doc("")).is_empty());
    }

    #[test]
    fn fixed_windows_respect_char_boundaries() {
        let thai = "สวัสดีครับ".repeat(10);
        let chunks = FixedSizeChunker::new(7, 2).chunk(&doc(&thai));
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 7);
        }
        assert!(thai.ends_with(&chunks.last().unwrap().content));
    }

    #[test]
    fn fixed_merges_short_tail() {
        let text = "a".repeat(21);
        let chunks = FixedSizeChunker::new(10, 0).with_min_chunk_size(5).chunk(&doc(&text));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].content.len(), 11);
    }

    #[test]
    fn recursive_prefers_paragraph_boundaries() {
        let text = format!("{}\n\n{}", "first paragraph text", "second paragraph text");
        let chunks = RecursiveChunker::new(25, 0).chunk(&doc(&text));
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].content.starts_with("first"));
        assert!(chunks[1].content.starts_with("second"));
    }

    #[test]
    fn recursive_merges_short_chunks() {
        let text = format!("{}\n\nok", "x".repeat(30));
        let chunks = RecursiveChunker::new(32, 0).with_min_chunk_size(5).chunk(&doc(&text));
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.ends_with("ok"));
    }

    #[test]
    fn markdown_records_header_path() {
        let text = "# Rust\nintro\n## Ownership\nmoves and borrows\n";
        let chunks = MarkdownChunker::new(200, 0).chunk(&doc(text));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].metadata[HEADER_PATH_KEY], "Rust > Ownership");
        assert!(chunks[1].content.starts_with("Rust > Ownership\n"));
    }

    #[test]
    fn markdown_ignores_tags_and_fenced_hashes() {
        let text = "# Title\n#tag line\n```sh\n# a shell comment\n```\n";
        let chunks = MarkdownChunker::new(200, 0).chunk(&doc(text));
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("# a shell comment"));
        assert!(chunks[0].content.contains("#tag line"));
    }
}
