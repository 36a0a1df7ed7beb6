//! Local fallback backend
//!
//! Chunks live in memory behind a `RwLock`. When a path is configured the
//! full list is rewritten to a JSON file after every mutation (write to a
//! temporary sibling, then rename), so a restart sees the same contents.
//!
//! The fallback never stores vectors. Test builds can opt in with
//! `keep_embeddings` (feature `test-util`) to stand in for the durable store.

use super::ChunkStore;
use crate::embeddings::cosine_similarity;
use crate::errors::{AppError, Result};
use crate::types::{DocumentChunk, ScoredChunk};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// On-disk entry layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalEntry {
    id: Uuid,
    document_id: String,
    file_name: String,
    chunk_text: String,
    chunk_index: i32,
    chunk_size: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    embedding: Option<Vec<f32>>,
    #[serde(default)]
    metadata: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&DocumentChunk> for LocalEntry {
    fn from(chunk: &DocumentChunk) -> Self {
        Self {
            id: chunk.id,
            document_id: chunk.document_id.clone(),
            file_name: chunk.file_name.clone(),
            chunk_text: chunk.chunk_text.clone(),
            chunk_index: chunk.chunk_index,
            chunk_size: chunk.chunk_size,
            embedding: chunk.embedding.clone(),
            metadata: chunk.metadata.clone(),
            user_id: chunk.user_id.clone(),
            created_at: chunk.created_at,
            updated_at: chunk.updated_at,
        }
    }
}

impl From<LocalEntry> for DocumentChunk {
    fn from(entry: LocalEntry) -> Self {
        Self {
            id: entry.id,
            document_id: entry.document_id,
            file_name: entry.file_name,
            chunk_text: entry.chunk_text,
            chunk_index: entry.chunk_index,
            chunk_size: entry.chunk_size,
            embedding: entry.embedding,
            metadata: entry.metadata,
            user_id: entry.user_id,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

pub struct LocalChunkStore {
    chunks: RwLock<Vec<DocumentChunk>>,
    path: Option<PathBuf>,
    keep_embeddings: bool,
}

impl LocalChunkStore {
    /// Store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            chunks: RwLock::new(Vec::new()),
            path: None,
            keep_embeddings: false,
        }
    }

    /// Store persisted to `path`, loading existing contents if the file exists
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let chunks = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let entries: Vec<LocalEntry> =
                    serde_json::from_slice(&bytes).map_err(|e| AppError::StoreRead {
                        backend: "local".to_string(),
                        message: format!("{}: {}", path.display(), e),
                    })?;
                entries.into_iter().map(DocumentChunk::from).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(AppError::StoreRead {
                    backend: "local".to_string(),
                    message: format!("{}: {}", path.display(), e),
                })
            }
        };

        info!(path = %path.display(), chunk_count = chunks.len(), "Opened local chunk store");

        Ok(Self {
            chunks: RwLock::new(chunks),
            path: Some(path),
            keep_embeddings: false,
        })
    }

    /// Retain vectors on save so `match_chunks` can rank by cosine similarity
    #[cfg(any(test, feature = "test-util"))]
    pub fn keep_embeddings(mut self) -> Self {
        self.keep_embeddings = true;
        self
    }

    async fn remove_where<F>(&self, matches: F) -> Result<u64>
    where
        F: Fn(&DocumentChunk) -> bool + Send,
    {
        let mut guard = self.chunks.write().await;
        let before = guard.len();

        let next: Vec<DocumentChunk> = guard.iter().filter(|c| !matches(c)).cloned().collect();

        let removed = (before - next.len()) as u64;
        if removed > 0 {
            self.persist(&next).await?;
            *guard = next;
        }

        Ok(removed)
    }

    async fn persist(&self, chunks: &[DocumentChunk]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let entries: Vec<LocalEntry> = chunks.iter().map(LocalEntry::from).collect();
        let bytes = serde_json::to_vec(&entries)?;

        let write_err = |e: std::io::Error| AppError::StoreWrite {
            backend: "local".to_string(),
            message: format!("{}: {}", path.display(), e),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(write_err)?;

        debug!(path = %path.display(), chunk_count = chunks.len(), "Local store flushed");
        Ok(())
    }
}

#[async_trait]
impl ChunkStore for LocalChunkStore {
    async fn save(&self, chunks: Vec<DocumentChunk>) -> Result<Vec<DocumentChunk>> {
        let saved: Vec<DocumentChunk> = chunks
            .into_iter()
            .map(|mut chunk| {
                if !self.keep_embeddings && chunk.embedding.take().is_some() {
                    if let Some(meta) = chunk.metadata.as_object_mut() {
                        meta.insert("processing_method".into(), "text_only".into());
                    }
                }
                chunk
            })
            .collect();

        let mut guard = self.chunks.write().await;
        let mut next = guard.clone();
        next.extend(saved.iter().cloned());

        // Memory only changes once the file write succeeded
        self.persist(&next).await?;
        *guard = next;

        Ok(saved)
    }

    async fn delete_by_document(&self, document_id: &str, owner_id: Option<&str>) -> Result<u64> {
        self.remove_where(|c| c.is_deletable_by(document_id, owner_id))
            .await
    }

    async fn delete_version(&self, document_id: &str, owner_id: Option<&str>) -> Result<u64> {
        self.remove_where(|c| c.document_id == document_id && c.is_visible_to(owner_id))
            .await
    }

    async fn list(&self, owner_id: Option<&str>) -> Result<Vec<DocumentChunk>> {
        let guard = self.chunks.read().await;
        Ok(guard
            .iter()
            .filter(|c| c.is_visible_to(owner_id))
            .cloned()
            .collect())
    }

    async fn match_chunks(
        &self,
        embedding: &[f32],
        owner_id: Option<&str>,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let guard = self.chunks.read().await;

        let mut scored: Vec<ScoredChunk> = guard
            .iter()
            .filter(|c| c.is_visible_to(owner_id))
            .filter_map(|c| {
                let vector = c.embedding.as_deref()?;
                let score = cosine_similarity(embedding, vector);
                (score >= threshold).then(|| ScoredChunk {
                    chunk: c.clone(),
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn update_embedding(&self, chunk_id: Uuid, embedding: &[f32]) -> Result<bool> {
        if !self.keep_embeddings {
            return Ok(false);
        }

        let mut guard = self.chunks.write().await;
        let mut next = guard.clone();

        let Some(chunk) = next.iter_mut().find(|c| c.id == chunk_id) else {
            return Ok(false);
        };
        chunk.embedding = Some(embedding.to_vec());
        chunk.updated_at = Utc::now();

        self.persist(&next).await?;
        *guard = next;
        Ok(true)
    }

    async fn ping(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) if tokio::fs::metadata(parent).await.is_err() => {
                Err(AppError::StoreRead {
                    backend: "local".to_string(),
                    message: format!("{} is not accessible", parent.display()),
                })
            }
            _ => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
