//! Repository pattern for database operations
//!
//! All chunk persistence for the durable backend. Vector columns are read
//! and written through raw SQL; ownership filtering uses
//! `user_id IS NOT DISTINCT FROM $n` so an absent owner matches unowned rows.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::Result;
use crate::types::{DocumentChunk, ScoredChunk};
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    FromQueryResult, QueryFilter, Statement, TransactionTrait,
};
use uuid::Uuid;

/// Row shape returned by `match_document_chunks`
#[derive(Debug, FromQueryResult)]
struct MatchRow {
    id: Uuid,
    document_id: String,
    file_name: String,
    chunk_text: String,
    chunk_index: i32,
    chunk_size: i32,
    metadata: serde_json::Value,
    user_id: Option<String>,
    created_at: DateTime<FixedOffset>,
    updated_at: DateTime<FixedOffset>,
    similarity: f64,
}

impl From<MatchRow> for ScoredChunk {
    fn from(row: MatchRow) -> Self {
        ScoredChunk {
            chunk: DocumentChunk {
                id: row.id,
                document_id: row.document_id,
                file_name: row.file_name,
                chunk_text: row.chunk_text,
                chunk_index: row.chunk_index,
                chunk_size: row.chunk_size,
                embedding: None,
                metadata: row.metadata,
                user_id: row.user_id,
                created_at: row.created_at.with_timezone(&Utc),
                updated_at: row.updated_at.with_timezone(&Utc),
            },
            score: row.similarity as f32,
        }
    }
}

const SELECT_CHUNK_COLUMNS: &str = r#"
    id, document_id, file_name, chunk_text, chunk_index, chunk_size,
    embedding::text AS embedding, metadata, user_id, created_at, updated_at
"#;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Chunk Operations
    // ========================================================================

    /// Insert chunks in a single transaction
    pub async fn insert_chunks(&self, chunks: &[DocumentChunk]) -> Result<()> {
        let txn = self.write_conn().begin().await?;

        for chunk in chunks {
            let embedding = chunk.embedding.as_deref().map(format_vector);

            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"
                INSERT INTO document_chunks (
                    id, document_id, file_name, chunk_text, chunk_index, chunk_size,
                    embedding, metadata, user_id, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7::vector, $8, $9, $10, $11)
                "#,
                vec![
                    chunk.id.into(),
                    chunk.document_id.clone().into(),
                    chunk.file_name.clone().into(),
                    chunk.chunk_text.clone().into(),
                    chunk.chunk_index.into(),
                    chunk.chunk_size.into(),
                    embedding.into(),
                    chunk.metadata.clone().into(),
                    chunk.user_id.clone().into(),
                    to_db_time(chunk.created_at).into(),
                    to_db_time(chunk.updated_at).into(),
                ],
            );

            txn.execute(stmt).await?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// Delete every chunk of a document, restricted to one owner when given
    pub async fn delete_by_document(
        &self,
        document_id: &str,
        owner_id: Option<&str>,
    ) -> Result<u64> {
        let mut condition = Condition::all().add(ChunkColumn::DocumentId.eq(document_id));
        if let Some(owner) = owner_id {
            condition = condition.add(ChunkColumn::UserId.eq(owner));
        }

        let result = ChunkEntity::delete_many()
            .filter(condition)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected)
    }

    /// Delete a document's chunks stored under exactly this owner
    /// (unowned rows when `owner_id` is `None`)
    pub async fn delete_version(&self, document_id: &str, owner_id: Option<&str>) -> Result<u64> {
        let owner = match owner_id {
            Some(owner) => ChunkColumn::UserId.eq(owner),
            None => ChunkColumn::UserId.is_null(),
        };

        let result = ChunkEntity::delete_many()
            .filter(ChunkColumn::DocumentId.eq(document_id))
            .filter(owner)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected)
    }

    /// All chunks visible to an owner, ordered by document and index
    pub async fn list_chunks(&self, owner_id: Option<&str>) -> Result<Vec<DocumentChunk>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM document_chunks
            WHERE user_id IS NOT DISTINCT FROM $1
            ORDER BY document_id, chunk_index
            "#,
            SELECT_CHUNK_COLUMNS
        );

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            &sql,
            vec![owner_id.map(str::to_string).into()],
        );

        let rows = ChunkEntity::find()
            .from_raw_sql(stmt)
            .all(self.read_conn())
            .await?;

        Ok(rows.into_iter().map(DocumentChunk::from).collect())
    }

    /// Vector similarity search through the store-side ranking function
    pub async fn match_chunks(
        &self,
        embedding: &[f32],
        owner_id: Option<&str>,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT id, document_id, file_name, chunk_text, chunk_index, chunk_size,
                   metadata, user_id, created_at, updated_at, similarity
            FROM match_document_chunks($1::vector, $2, $3, $4)
            "#,
            vec![
                format_vector(embedding).into(),
                f64::from(threshold).into(),
                (limit as i32).into(),
                owner_id.map(str::to_string).into(),
            ],
        );

        let rows = MatchRow::find_by_statement(stmt)
            .all(self.read_conn())
            .await?;

        Ok(rows.into_iter().map(ScoredChunk::from).collect())
    }

    /// Back-fill the embedding of one chunk
    pub async fn update_embedding(&self, chunk_id: Uuid, embedding: &[f32]) -> Result<bool> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE document_chunks SET embedding = $1::vector, updated_at = $2 WHERE id = $3",
            vec![
                format_vector(embedding).into(),
                to_db_time(Utc::now()).into(),
                chunk_id.into(),
            ],
        );

        let result = self.write_conn().execute(stmt).await?;
        Ok(result.rows_affected() > 0)
    }
}
