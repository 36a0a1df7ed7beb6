//! Document chunk entity
//!
//! The `embedding` column is a pgvector `vector(1536)`. SeaORM has no native
//! mapping for it, so the entity declares it as text and every read or write
//! of vectors goes through raw SQL in the repository (`embedding::text`,
//! `$n::vector`).

use crate::types::DocumentChunk;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "document_chunks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub document_id: String,

    #[sea_orm(column_type = "Text")]
    pub file_name: String,

    #[sea_orm(column_type = "Text")]
    pub chunk_text: String,

    pub chunk_index: i32,

    pub chunk_size: i32,

    /// pgvector embedding in its text form "[0.1,0.2,...]"
    #[sea_orm(column_type = "Text", nullable)]
    pub embedding: Option<String>,

    /// Provenance as JSONB
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: serde_json::Value,

    #[sea_orm(column_type = "Text", nullable)]
    pub user_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parse embedding from stored text format to Vec<f32>
    pub fn parse_embedding(&self) -> Option<Vec<f32>> {
        self.embedding.as_deref().and_then(parse_vector)
    }
}

impl From<Model> for DocumentChunk {
    fn from(row: Model) -> Self {
        let embedding = row.parse_embedding();
        DocumentChunk {
            id: row.id,
            document_id: row.document_id,
            file_name: row.file_name,
            chunk_text: row.chunk_text,
            chunk_index: row.chunk_index,
            chunk_size: row.chunk_size,
            embedding,
            metadata: row.metadata,
            user_id: row.user_id,
            created_at: row.created_at.with_timezone(&Utc),
            updated_at: row.updated_at.with_timezone(&Utc),
        }
    }
}

/// Parse pgvector text output: "[1.0,2.0,3.0,...]"
pub fn parse_vector(text: &str) -> Option<Vec<f32>> {
    let inner = text.trim().trim_start_matches('[').trim_end_matches(']');
    if inner.trim().is_empty() {
        return None;
    }
    inner
        .split(',')
        .map(|v| v.trim().parse::<f32>().ok())
        .collect()
}

/// Format a vector as pgvector input text
pub fn format_vector(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

/// Convert a timestamp for binding or comparison against `timestamptz` columns
pub fn to_db_time(ts: DateTime<Utc>) -> DateTimeWithTimeZone {
    ts.fixed_offset()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_text_format() {
        assert_eq!(format_vector(&[0.1, 0.2, 0.3]), "[0.1,0.2,0.3]");
        assert_eq!(parse_vector("[0.1, 0.2,0.3]"), Some(vec![0.1, 0.2, 0.3]));
        assert_eq!(parse_vector("[]"), None);
        assert_eq!(parse_vector("[0.1,abc]"), None);
    }

    #[test]
    fn test_row_converts_to_chunk() {
        let now = Utc::now();
        let row = Model {
            id: Uuid::new_v4(),
            document_id: "doc1".into(),
            file_name: "a.txt".into(),
            chunk_text: "hello".into(),
            chunk_index: 0,
            chunk_size: 5,
            embedding: Some("[1,0]".into()),
            metadata: serde_json::json!({"processing_method": "embedded"}),
            user_id: Some("A".into()),
            created_at: to_db_time(now),
            updated_at: to_db_time(now),
        };

        let chunk = DocumentChunk::from(row);
        assert_eq!(chunk.embedding, Some(vec![1.0, 0.0]));
        assert_eq!(chunk.created_at, now);
        assert_eq!(chunk.user_id.as_deref(), Some("A"));
    }
}
