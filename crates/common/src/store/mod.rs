//! Chunk storage
//!
//! Two interchangeable backends sit behind [`ChunkStore`]:
//! - [`PostgresChunkStore`]: durable Postgres/pgvector table
//! - [`LocalChunkStore`]: in-process list, optionally persisted to a JSON file
//!
//! [`StoreRouter`] is the handle callers receive. It is built once from
//! configuration and decides per operation whether the durable backend
//! serves the request or the fallback store takes over. The decision is
//! returned in the type ([`Persisted`]) rather than hidden.

mod local;
mod postgres;

pub use local::LocalChunkStore;
pub use postgres::PostgresChunkStore;

use crate::config::AppConfig;
use crate::db::{DbPool, Repository};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::types::{DocumentChunk, ScoredChunk};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Storage contract shared by both backends
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Persist a batch of chunks and return the stored representation
    async fn save(&self, chunks: Vec<DocumentChunk>) -> Result<Vec<DocumentChunk>>;

    /// Delete every chunk of a document, restricted to one owner when given
    async fn delete_by_document(&self, document_id: &str, owner_id: Option<&str>) -> Result<u64>;

    /// Delete a document's chunks stored under exactly this owner;
    /// `None` matches only unowned chunks
    async fn delete_version(&self, document_id: &str, owner_id: Option<&str>) -> Result<u64>;

    /// All chunks visible to an owner
    async fn list(&self, owner_id: Option<&str>) -> Result<Vec<DocumentChunk>>;

    /// Chunks ranked by cosine similarity to `embedding`, at or above `threshold`
    async fn match_chunks(
        &self,
        embedding: &[f32],
        owner_id: Option<&str>,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>>;

    /// Attach an embedding to an existing chunk
    async fn update_embedding(&self, chunk_id: Uuid, embedding: &[f32]) -> Result<bool>;

    /// Check the backend is reachable
    async fn ping(&self) -> Result<()>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Which slot of the router served an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Durable,
    Fallback,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Durable => write!(f, "durable"),
            StoreBackend::Fallback => write!(f, "fallback"),
        }
    }
}

/// Outcome of a write, tagged with the backend that accepted it
#[derive(Debug, Clone, PartialEq)]
pub enum Persisted<T> {
    Durable(T),
    Fallback(T),
}

impl<T> Persisted<T> {
    pub fn backend(&self) -> StoreBackend {
        match self {
            Persisted::Durable(_) => StoreBackend::Durable,
            Persisted::Fallback(_) => StoreBackend::Fallback,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Persisted::Durable(value) | Persisted::Fallback(value) => value,
        }
    }
}

/// Health of each configured backend
#[derive(Debug, Clone, Serialize)]
pub struct StoreHealth {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub durable: Option<std::result::Result<(), String>>,
    pub fallback: std::result::Result<(), String>,
}

/// Store handle injected into the processor and search service
#[derive(Clone)]
pub struct StoreRouter {
    durable: Option<Arc<dyn ChunkStore>>,
    fallback: Arc<dyn ChunkStore>,
}

impl StoreRouter {
    pub fn new(durable: Option<Arc<dyn ChunkStore>>, fallback: Arc<dyn ChunkStore>) -> Self {
        Self { durable, fallback }
    }

    /// Router without a durable backend
    pub fn local_only(fallback: Arc<dyn ChunkStore>) -> Self {
        Self::new(None, fallback)
    }

    /// Select backends from configuration.
    ///
    /// No database URL, or a database that cannot be reached at startup,
    /// leaves the router on the fallback store alone.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let fallback: Arc<dyn ChunkStore> = match &config.fallback.path {
            Some(path) => Arc::new(LocalChunkStore::open(path).await?),
            None => Arc::new(LocalChunkStore::in_memory()),
        };

        if !config.has_database() {
            info!(fallback = fallback.name(), "No database configured, using fallback store");
            return Ok(Self::local_only(fallback));
        }

        match DbPool::new(&config.database).await {
            Ok(pool) => {
                let durable: Arc<dyn ChunkStore> =
                    Arc::new(PostgresChunkStore::new(Repository::new(pool)));
                info!("Durable chunk store ready");
                Ok(Self::new(Some(durable), fallback))
            }
            Err(e) => {
                warn!(error = %e, "Database unreachable at startup, using fallback store");
                metrics::record_fallback("connect");
                Ok(Self::local_only(fallback))
            }
        }
    }

    pub fn has_durable(&self) -> bool {
        self.durable.is_some()
    }

    pub fn durable(&self) -> Option<&Arc<dyn ChunkStore>> {
        self.durable.as_ref()
    }

    pub fn fallback(&self) -> &Arc<dyn ChunkStore> {
        &self.fallback
    }

    /// Store a document's chunks in place of any earlier version.
    ///
    /// The earlier version (same document, same owner) is removed from both
    /// backends before the write, so a document never holds two chunk
    /// sequences. A durable delete or write failure sends the new version to
    /// the fallback store; `Err` only when that write fails too.
    pub async fn replace_document(
        &self,
        document_id: &str,
        owner_id: Option<&str>,
        chunks: Vec<DocumentChunk>,
    ) -> Result<Persisted<Vec<DocumentChunk>>> {
        match self.fallback.delete_version(document_id, owner_id).await {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "Removed earlier fallback chunks"),
            Err(e) => warn!(error = %e, "Could not clear earlier fallback chunks"),
        }

        if let Some(durable) = &self.durable {
            let written = match durable.delete_version(document_id, owner_id).await {
                Ok(removed) => {
                    if removed > 0 {
                        debug!(removed, "Removed earlier durable chunks");
                    }
                    durable.save(chunks.clone()).await
                }
                Err(e) => Err(e),
            };

            match written {
                Ok(saved) => return Ok(Persisted::Durable(saved)),
                Err(e) => {
                    warn!(
                        error = %e,
                        backend = durable.name(),
                        chunk_count = chunks.len(),
                        "Durable write failed, writing chunks to fallback store"
                    );
                    metrics::record_fallback("save");
                }
            }
        }

        let saved = self.fallback.save(chunks).await?;
        Ok(Persisted::Fallback(saved))
    }

    /// Every chunk visible to an owner across both backends.
    ///
    /// A failing durable read degrades to the fallback contents; an error is
    /// returned only when the fallback store cannot be read either.
    pub async fn corpus(&self, owner_id: Option<&str>) -> Result<Vec<DocumentChunk>> {
        let Some(durable) = &self.durable else {
            return self.fallback.list(owner_id).await;
        };

        let (durable_rows, fallback_rows) =
            futures::join!(durable.list(owner_id), self.fallback.list(owner_id));

        match (durable_rows, fallback_rows) {
            (Ok(mut rows), Ok(local)) => {
                rows.extend(local);
                Ok(rows)
            }
            (Err(e), Ok(local)) => {
                warn!(error = %e, "Durable read failed, serving fallback store contents");
                metrics::record_fallback("read");
                Ok(local)
            }
            (Ok(rows), Err(e)) => {
                warn!(error = %e, "Fallback store unreadable, serving durable rows only");
                Ok(rows)
            }
            (Err(durable_err), Err(fallback_err)) => Err(AppError::StoreRead {
                backend: "all".to_string(),
                message: format!("durable: {}; fallback: {}", durable_err, fallback_err),
            }),
        }
    }

    /// Vector ranking from the durable backend
    pub async fn match_chunks(
        &self,
        embedding: &[f32],
        owner_id: Option<&str>,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let durable = self.durable.as_ref().ok_or_else(|| AppError::Search {
            message: "vector search requires a durable store".to_string(),
        })?;

        durable
            .match_chunks(embedding, owner_id, threshold, limit)
            .await
            .map_err(|e| AppError::StoreRead {
                backend: durable.name().to_string(),
                message: e.to_string(),
            })
    }

    /// Delete a document's chunks from every backend
    pub async fn delete_by_document(&self, document_id: &str, owner_id: Option<&str>) -> Result<u64> {
        let mut deleted = self.fallback.delete_by_document(document_id, owner_id).await?;

        if let Some(durable) = &self.durable {
            deleted += durable.delete_by_document(document_id, owner_id).await?;
        }

        Ok(deleted)
    }

    /// Back-fill an embedding; only the durable backend keeps vectors
    pub async fn update_embedding(&self, chunk_id: Uuid, embedding: &[f32]) -> Result<bool> {
        match &self.durable {
            Some(durable) => durable.update_embedding(chunk_id, embedding).await,
            None => Ok(false),
        }
    }

    /// Ping every backend
    pub async fn health(&self) -> StoreHealth {
        let durable = match &self.durable {
            Some(store) => Some(store.ping().await.map_err(|e| e.to_string())),
            None => None,
        };

        StoreHealth {
            durable,
            fallback: self.fallback.ping().await.map_err(|e| e.to_string()),
        }
    }
}
