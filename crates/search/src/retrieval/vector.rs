//! Vector similarity search
//!
//! Embeds the query and delegates ranking to the durable store
//! (`match_document_chunks` on pgvector).

use super::SearchQuery;
use docchat_common::embeddings::Embedder;
use docchat_common::errors::Result;
use docchat_common::store::StoreRouter;
use docchat_common::types::ScoredChunk;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Vector retriever over the durable store
pub struct VectorRetriever {
    store: Arc<StoreRouter>,
    embedder: Arc<dyn Embedder>,
}

impl VectorRetriever {
    pub fn new(store: Arc<StoreRouter>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    #[instrument(skip(self, query), fields(model = self.embedder.model_name()))]
    pub async fn retrieve(&self, query: &SearchQuery) -> Result<Vec<ScoredChunk>> {
        let embedding = self.embedder.embed(&query.query).await?;

        let results = self
            .store
            .match_chunks(
                &embedding,
                query.owner_id.as_deref(),
                query.threshold,
                query.limit,
            )
            .await?;

        debug!(result_count = results.len(), "Vector search complete");
        Ok(results)
    }
}
