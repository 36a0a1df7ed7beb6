//! Document processor
//!
//! Turns extracted document text into stored, searchable chunks:
//! chunk, classify, embed (when a credential is available), then persist
//! through the store router.

use crate::chunker::{chunk_text, ChunkingConfig};
use crate::classify::{ContentClassification, ContentClassifier};
use crate::errors::IngestionError;
use docchat_common::config::AppConfig;
use docchat_common::embeddings::Embedder;
use docchat_common::errors::ErrorCode;
use docchat_common::metrics;
use docchat_common::store::{Persisted, StoreBackend, StoreRouter};
use docchat_common::types::DocumentChunk;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Outcome of indexing one document
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResponse {
    pub success: bool,

    /// Stored chunks in index order
    pub chunks: Vec<DocumentChunk>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<StoreBackend>,

    /// Number of stored chunks carrying a vector
    pub embedded: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl ProcessResponse {
    fn stored(persisted: Persisted<Vec<DocumentChunk>>) -> Self {
        let backend = persisted.backend();
        let chunks = persisted.into_inner();
        let embedded = chunks.iter().filter(|c| c.has_embedding()).count();

        Self {
            success: true,
            chunks,
            backend: Some(backend),
            embedded,
            error: None,
            code: None,
        }
    }

    fn failed(error: &IngestionError) -> Self {
        Self {
            success: false,
            chunks: Vec::new(),
            backend: None,
            embedded: 0,
            error: Some(error.to_string()),
            code: Some(error.code()),
        }
    }
}

/// Counts from an embedding back-fill run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub updated: usize,
    pub failed: usize,
}

/// Document processor
pub struct DocumentProcessor {
    store: Arc<StoreRouter>,
    classifier: ContentClassifier,
    chunking: ChunkingConfig,
    request_delay: Duration,
}

impl DocumentProcessor {
    pub fn new(store: Arc<StoreRouter>, config: &AppConfig) -> Result<Self, IngestionError> {
        Ok(Self {
            store,
            classifier: ContentClassifier::new()?,
            chunking: ChunkingConfig::from(&config.chunking),
            request_delay: Duration::from_millis(config.embedding.request_delay_ms),
        })
    }

    /// Override the pause between consecutive embedding calls
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    /// Chunk, embed and store a document, replacing any version indexed
    /// earlier under the same owner. Never returns an error; failures are
    /// reported in the response.
    #[instrument(skip(self, text, embedder), fields(text_len = text.len()))]
    pub async fn process_document_for_search(
        &self,
        document_id: &str,
        file_name: &str,
        text: &str,
        owner_id: Option<&str>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> ProcessResponse {
        let started = Instant::now();

        match self
            .process(document_id, file_name, text, owner_id, embedder.as_deref())
            .await
        {
            Ok(persisted) => {
                let response = ProcessResponse::stored(persisted);
                let backend = response.backend.map(|b| b.to_string()).unwrap_or_default();

                metrics::record_ingestion(
                    started.elapsed().as_secs_f64(),
                    response.chunks.len(),
                    &backend,
                );

                info!(
                    chunk_count = response.chunks.len(),
                    embedded = response.embedded,
                    backend = %backend,
                    "Document indexed"
                );
                response
            }
            Err(e) => {
                error!(error = %e, "Document indexing failed");
                ProcessResponse::failed(&e)
            }
        }
    }

    async fn process(
        &self,
        document_id: &str,
        file_name: &str,
        text: &str,
        owner_id: Option<&str>,
        embedder: Option<&dyn Embedder>,
    ) -> Result<Persisted<Vec<DocumentChunk>>, IngestionError> {
        if document_id.trim().is_empty() {
            return Err(IngestionError::validation("document_id", "document id is required"));
        }
        if text.trim().is_empty() {
            return Err(IngestionError::validation("text", "document text is empty"));
        }

        let pieces = chunk_text(text, &self.chunking);
        if pieces.is_empty() {
            return Err(IngestionError::EmptyDocument(document_id.to_string()));
        }

        let classification = self.classifier.classify(text);
        if classification.quality.low_quality {
            warn!(
                ratio = classification.quality.alphanumeric_ratio,
                "Low alphanumeric ratio, extraction may be garbled"
            );
        }

        let provenance = Provenance {
            content_hash: hex::encode(Sha256::digest(text.as_bytes())),
            original_length: text.chars().count(),
            classification,
        };

        let mut chunks: Vec<DocumentChunk> = pieces
            .into_iter()
            .map(|piece| {
                let mut chunk = DocumentChunk::new(
                    document_id,
                    file_name,
                    piece.content,
                    piece.index,
                    owner_id.map(str::to_string),
                );
                chunk.metadata = provenance.metadata(piece.start_pos, piece.end_pos);
                chunk
            })
            .collect();

        if let Some(embedder) = embedder {
            let failed = self.embed_chunks(&mut chunks, embedder).await;
            if failed > 0 {
                warn!(failed, total = chunks.len(), "Some chunks stored without embeddings");
            }
        }

        Ok(self
            .store
            .replace_document(document_id, owner_id, chunks)
            .await?)
    }

    /// Embed chunks one at a time, returning the number of failures
    async fn embed_chunks(&self, chunks: &mut [DocumentChunk], embedder: &dyn Embedder) -> usize {
        let mut failed = 0;

        for (i, chunk) in chunks.iter_mut().enumerate() {
            if i > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            match embedder.embed(&chunk.chunk_text).await {
                Ok(vector) => {
                    if let Some(meta) = chunk.metadata.as_object_mut() {
                        meta.insert("processing_method".into(), "embedded".into());
                        meta.insert("embedding_model".into(), embedder.model_name().into());
                        meta.insert("embedding_dimension".into(), vector.len().into());
                    }
                    chunk.embedding = Some(vector);
                }
                Err(e) => {
                    failed += 1;
                    warn!(chunk_index = chunk.chunk_index, error = %e, "Embedding failed for chunk");
                }
            }
        }

        debug!(total = chunks.len(), failed, "Embedding pass complete");
        failed
    }

    /// Embed durable chunks that were stored without a vector
    #[instrument(skip(self, embedder))]
    pub async fn backfill_embeddings(
        &self,
        owner_id: Option<&str>,
        embedder: &dyn Embedder,
    ) -> Result<BackfillReport, IngestionError> {
        let Some(durable) = self.store.durable() else {
            debug!("No durable store, nothing to back-fill");
            return Ok(BackfillReport::default());
        };

        let pending: Vec<DocumentChunk> = durable
            .list(owner_id)
            .await?
            .into_iter()
            .filter(|c| !c.has_embedding())
            .collect();

        let mut report = BackfillReport::default();

        for (i, chunk) in pending.iter().enumerate() {
            if i > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            let vector = match embedder.embed(&chunk.chunk_text).await {
                Ok(vector) => vector,
                Err(e) => {
                    warn!(chunk_id = %chunk.id, error = %e, "Back-fill embedding failed");
                    report.failed += 1;
                    continue;
                }
            };

            match self.store.update_embedding(chunk.id, &vector).await {
                Ok(true) => report.updated += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    warn!(chunk_id = %chunk.id, error = %e, "Back-fill update failed");
                    report.failed += 1;
                }
            }
        }

        info!(updated = report.updated, failed = report.failed, "Embedding back-fill complete");
        Ok(report)
    }
}

/// Document-level metadata copied onto every chunk
struct Provenance {
    content_hash: String,
    original_length: usize,
    classification: ContentClassification,
}

impl Provenance {
    fn metadata(&self, start_pos: usize, end_pos: usize) -> serde_json::Value {
        json!({
            "processing_method": "text_only",
            "content_hash": self.content_hash,
            "original_length": self.original_length,
            "start_pos": start_pos,
            "end_pos": end_pos,
            "classification": self.classification,
        })
    }
}
