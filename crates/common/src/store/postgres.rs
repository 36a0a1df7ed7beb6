//! Durable backend over the `document_chunks` table

use super::ChunkStore;
use crate::db::Repository;
use crate::errors::{AppError, Result};
use crate::types::{DocumentChunk, ScoredChunk};
use async_trait::async_trait;
use tracing::{debug, instrument};
use uuid::Uuid;

pub struct PostgresChunkStore {
    repo: Repository,
}

impl PostgresChunkStore {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ChunkStore for PostgresChunkStore {
    #[instrument(skip(self, chunks), fields(chunk_count = chunks.len()))]
    async fn save(&self, chunks: Vec<DocumentChunk>) -> Result<Vec<DocumentChunk>> {
        self.repo
            .insert_chunks(&chunks)
            .await
            .map_err(|e| AppError::StoreWrite {
                backend: self.name().to_string(),
                message: e.to_string(),
            })?;

        debug!("Chunks committed");
        Ok(chunks)
    }

    async fn delete_by_document(&self, document_id: &str, owner_id: Option<&str>) -> Result<u64> {
        self.repo
            .delete_by_document(document_id, owner_id)
            .await
            .map_err(|e| AppError::StoreWrite {
                backend: self.name().to_string(),
                message: e.to_string(),
            })
    }

    async fn delete_version(&self, document_id: &str, owner_id: Option<&str>) -> Result<u64> {
        self.repo
            .delete_version(document_id, owner_id)
            .await
            .map_err(|e| AppError::StoreWrite {
                backend: self.name().to_string(),
                message: e.to_string(),
            })
    }

    async fn list(&self, owner_id: Option<&str>) -> Result<Vec<DocumentChunk>> {
        self.repo
            .list_chunks(owner_id)
            .await
            .map_err(|e| AppError::StoreRead {
                backend: self.name().to_string(),
                message: e.to_string(),
            })
    }

    #[instrument(skip(self, embedding))]
    async fn match_chunks(
        &self,
        embedding: &[f32],
        owner_id: Option<&str>,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        self.repo
            .match_chunks(embedding, owner_id, threshold, limit)
            .await
    }

    async fn update_embedding(&self, chunk_id: Uuid, embedding: &[f32]) -> Result<bool> {
        self.repo.update_embedding(chunk_id, embedding).await
    }

    async fn ping(&self) -> Result<()> {
        self.repo.ping().await
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
