//! Data types for documents, embedded documents, search results and relationships.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form document metadata. Always carries a `source` key for documents
/// built through [`Document::new`].
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata key naming the origin of a document.
pub const SOURCE_KEY: &str = "source";
/// Metadata key holding a human-readable title.
pub const TITLE_KEY: &str = "title";
/// Metadata key linking a chunk back to its parent document.
pub const DOCUMENT_ID_KEY: &str = "document_id";
/// Metadata key holding the position of a chunk inside its parent.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

/// A note, or a chunk of one, as stored in the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Stable id; chunks use `{parent}_{index}`.
    pub id: String,
    /// Markdown body.
    pub content: String,
    /// Free-form metadata such as `title`, `source` and `tags`.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a document whose metadata carries the given `source`.
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), Value::String(source.into()));
        Self { id: id.into(), content: content.into(), metadata }
    }

    /// Add or replace one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Merge several metadata entries, overwriting existing keys.
    pub fn with_extra_metadata(mut self, extra: &Metadata) -> Self {
        for (key, value) in extra {
            self.metadata.insert(key.clone(), value.clone());
        }
        self
    }

    /// The origin identifier, if present.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(Value::as_str)
    }

    /// The title, if present.
    pub fn title(&self) -> Option<&str> {
        self.metadata.get(TITLE_KEY).and_then(Value::as_str)
    }

    /// The logical document this entry belongs to: the parent id for chunks,
    /// the entry id otherwise.
    pub fn document_id(&self) -> &str {
        logical_id(&self.id, &self.metadata)
    }

    /// Attach an embedding, producing an [`EmbeddedDocument`].
    pub fn with_embedding(self, embedding: Vec<f32>) -> EmbeddedDocument {
        EmbeddedDocument {
            id: self.id,
            content: self.content,
            embedding,
            metadata: self.metadata,
        }
    }
}

/// A [`Document`] together with its vector embedding.
///
/// This is also the record shape of the persisted store file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedDocument {
    /// Unique identifier for the entry.
    pub id: String,
    /// The text content that was embedded.
    pub content: String,
    /// The vector embedding for `content`.
    pub embedding: Vec<f32>,
    /// Key-value metadata associated with the entry.
    #[serde(default)]
    pub metadata: Metadata,
}

impl EmbeddedDocument {
    /// Create an embedded document directly.
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        embedding: Vec<f32>,
        metadata: Metadata,
    ) -> Self {
        Self { id: id.into(), content: content.into(), embedding, metadata }
    }

    /// A copy of the document without its embedding.
    pub fn document(&self) -> Document {
        Document {
            id: self.id.clone(),
            content: self.content.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// The origin identifier, if present.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(Value::as_str)
    }

    /// The logical document this entry belongs to.
    pub fn document_id(&self) -> &str {
        logical_id(&self.id, &self.metadata)
    }
}

fn logical_id<'a>(id: &'a str, metadata: &'a Metadata) -> &'a str {
    metadata.get(DOCUMENT_ID_KEY).and_then(Value::as_str).unwrap_or(id)
}

/// Qualitative bucket for how well a result matches a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    /// Strong match.
    High,
    /// Plausible match.
    Medium,
    /// Weak match.
    Low,
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        };
        f.write_str(label)
    }
}

/// A retrieved [`Document`] paired with its raw metric score.
///
/// `score` keeps the semantics of the store's metric: similarity for cosine
/// and inner product (higher is better), distance for euclid (lower is better).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// The retrieved document, embedding stripped.
    pub document: Document,
    /// The raw metric score.
    pub score: f32,
    /// Confidence bucket, filled in by the orchestrator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_level: Option<ConfidenceLevel>,
    /// Normalized relevance in `0..=100`, filled in by the orchestrator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_percentage: Option<u8>,
    /// Snippet with query terms emphasised.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlighted_text: Option<String>,
}

impl SearchResult {
    /// A bare result as produced by the store.
    pub fn new(document: Document, score: f32) -> Self {
        Self {
            document,
            score,
            confidence_level: None,
            relevance_percentage: None,
            highlighted_text: None,
        }
    }
}

/// How two documents relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipType {
    /// One document references the other.
    Reference,
    /// The documents are close in embedding space.
    Similar,
    /// The documents are explicitly linked.
    Linked,
}

/// A derived edge between two documents. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRelationship {
    /// The document the relationship was computed for.
    pub source_id: String,
    /// The related document.
    pub target_id: String,
    /// Strength in `[0, 1]`.
    pub strength: f32,
    /// The kind of relationship.
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
    /// Optional text describing the relationship.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}
