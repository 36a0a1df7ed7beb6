//! Canonical chunk and search result records
//!
//! Storage adapters translate to and from these types; nothing outside
//! `db` and `store` sees row or file layouts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of searchable document text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: Uuid,

    /// Parent document identifier
    pub document_id: String,

    /// Display name of the parent document
    pub file_name: String,

    pub chunk_text: String,

    /// Zero-based position within the parent document
    pub chunk_index: i32,

    /// Character length of `chunk_text`
    pub chunk_size: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Provenance bag (processing method, embedding model, classification, ...)
    #[serde(default)]
    pub metadata: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl DocumentChunk {
    /// Build a new chunk with a fresh id and `chunk_size` derived from the text
    pub fn new(
        document_id: impl Into<String>,
        file_name: impl Into<String>,
        chunk_text: impl Into<String>,
        chunk_index: i32,
        user_id: Option<String>,
    ) -> Self {
        let chunk_text = chunk_text.into();
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            document_id: document_id.into(),
            file_name: file_name.into(),
            chunk_size: chunk_text.chars().count() as i32,
            chunk_text,
            chunk_index,
            embedding: None,
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            user_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a read scoped to `owner_id` may see this chunk.
    ///
    /// Owned chunks are visible only to their owner; unowned chunks only
    /// to reads without an owner.
    pub fn is_visible_to(&self, owner_id: Option<&str>) -> bool {
        self.user_id.as_deref() == owner_id
    }

    /// Whether a delete scoped to `owner_id` applies to this chunk
    pub fn is_deletable_by(&self, document_id: &str, owner_id: Option<&str>) -> bool {
        self.document_id == document_id
            && owner_id.map_or(true, |owner| self.user_id.as_deref() == Some(owner))
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }
}

/// A chunk paired with its relevance to a query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// Search hit returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk_id: Uuid,
    pub document_id: String,
    pub file_name: String,
    pub chunk_text: String,
    pub chunk_index: i32,

    /// Cosine similarity in vector mode, matched-word fraction in lexical mode
    pub similarity: f32,

    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl From<ScoredChunk> for SearchResult {
    fn from(scored: ScoredChunk) -> Self {
        let ScoredChunk { chunk, score } = scored;
        Self {
            chunk_id: chunk.id,
            document_id: chunk.document_id,
            file_name: chunk.file_name,
            chunk_text: chunk.chunk_text,
            chunk_index: chunk.chunk_index,
            similarity: score,
            metadata: chunk.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_chunk_counts_characters() {
        let chunk = DocumentChunk::new("doc1", "notes.md", "héllo wörld", 0, None);
        assert_eq!(chunk.chunk_size, 11);
        assert_eq!(chunk.created_at, chunk.updated_at);
        assert!(!chunk.has_embedding());
    }

    #[test]
    fn test_visibility_rules() {
        let owned = DocumentChunk::new("doc1", "a.txt", "text", 0, Some("A".into()));
        let shared = DocumentChunk::new("doc2", "b.txt", "text", 0, None);

        assert!(owned.is_visible_to(Some("A")));
        assert!(!owned.is_visible_to(Some("B")));
        assert!(!owned.is_visible_to(None));
        assert!(shared.is_visible_to(None));
        assert!(!shared.is_visible_to(Some("A")));
    }

    #[test]
    fn test_delete_scope() {
        let owned = DocumentChunk::new("doc1", "a.txt", "text", 0, Some("A".into()));
        assert!(owned.is_deletable_by("doc1", None));
        assert!(owned.is_deletable_by("doc1", Some("A")));
        assert!(!owned.is_deletable_by("doc1", Some("B")));
        assert!(!owned.is_deletable_by("doc2", Some("A")));
    }

    #[test]
    fn test_search_result_from_scored_chunk() {
        let chunk = DocumentChunk::new("doc1", "report.pdf", "Annual budget", 3, None);
        let id = chunk.id;
        let result = SearchResult::from(ScoredChunk { chunk, score: 0.75 });
        assert_eq!(result.chunk_id, id);
        assert_eq!(result.chunk_index, 3);
        assert_eq!(result.file_name, "report.pdf");
        assert!((result.similarity - 0.75).abs() < f32::EPSILON);
    }
}
