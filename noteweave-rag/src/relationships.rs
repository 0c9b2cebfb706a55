//! Similarity-derived relationships between documents.
//!
//! Relationships are computed on demand from the vector store and never
//! persisted.

use std::collections::HashMap;

use tracing::debug;

use crate::document::{DocumentRelationship, RelationshipType};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Default minimum strength for a relationship to be reported.
pub const DEFAULT_MIN_STRENGTH: f32 = 0.7;

/// Default maximum number of relationships returned.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Find documents similar to `document_id`.
///
/// Every vector of the document (the entry itself or its chunks) is used as a
/// query. The document never relates to itself; each other logical document
/// appears once with its best normalized strength.
///
/// # Errors
///
/// Returns [`RagError::NotFound`] if the store holds no vectors for
/// `document_id`.
pub async fn find_related_documents(
    store: &dyn VectorStore,
    document_id: &str,
    min_strength: f32,
    max_results: usize,
) -> Result<Vec<DocumentRelationship>> {
    let vectors = store.get_vectors_by_document_id(document_id).await;
    if vectors.is_empty() {
        return Err(RagError::NotFound(format!("document '{document_id}'")));
    }
    if max_results == 0 {
        return Ok(Vec::new());
    }

    let metric = store.config().similarity_metric;
    let limit = store.get_document_count().await;
    let mut best: HashMap<String, (f32, Option<String>)> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for vector in &vectors {
        for hit in store.similarity_search(&vector.embedding, limit).await? {
            let target = hit.document.document_id().to_string();
            if target == document_id || hit.document.id == document_id {
                continue;
            }
            let strength = metric.normalize(hit.score);
            match best.get_mut(&target) {
                Some(entry) if entry.0 >= strength => {}
                Some(entry) => *entry = (strength, hit.document.title().map(str::to_string)),
                None => {
                    order.push(target.clone());
                    best.insert(target, (strength, hit.document.title().map(str::to_string)));
                }
            }
        }
    }

    let mut related: Vec<DocumentRelationship> = order
        .into_iter()
        .filter_map(|target| {
            let (strength, title) = best.remove(&target)?;
            (strength >= min_strength).then(|| DocumentRelationship {
                source_id: document_id.to_string(),
                target_id: target,
                strength,
                relationship_type: RelationshipType::Similar,
                context: title,
            })
        })
        .collect();

    related.sort_by(|a, b| b.strength.total_cmp(&a.strength));
    related.truncate(max_results);

    debug!(document.id = %document_id, related = related.len(), "derived relationships");
    Ok(related)
}
