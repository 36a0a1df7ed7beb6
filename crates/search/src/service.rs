//! Search service
//!
//! Public operations over the chunk corpus: search, stats and delete.
//! Every operation returns a structured response; errors never escape.

use crate::retrieval::{score_chunks, RetrievalMode, SearchQuery, VectorRetriever, MAX_QUERY_CHARS};
use crate::stats::{aggregate, CorpusStats};
use chrono::Utc;
use docchat_common::config::SearchSettings;
use docchat_common::embeddings::Embedder;
use docchat_common::errors::{AppError, ErrorCode, Result};
use docchat_common::metrics;
use docchat_common::store::{StoreBackend, StoreRouter};
use docchat_common::types::{ScoredChunk, SearchResult};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

const EMPTY_CORPUS_MESSAGE: &str = "No documents have been indexed yet";
const NO_MATCH_MESSAGE: &str = "No chunks matched the query";

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub results: Vec<SearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RetrievalMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<CorpusStats>,
    /// Backend new writes go to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<StoreBackend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

struct Outcome {
    results: Vec<ScoredChunk>,
    mode: RetrievalMode,
    message: Option<String>,
}

pub struct SearchService {
    store: Arc<StoreRouter>,
    settings: SearchSettings,
}

impl SearchService {
    pub fn new(store: Arc<StoreRouter>, settings: SearchSettings) -> Self {
        Self { store, settings }
    }

    /// Query built from the configured defaults
    pub fn query(&self, text: impl Into<String>) -> SearchQuery {
        SearchQuery::new(text)
            .limit(self.settings.default_limit)
            .threshold(self.settings.default_threshold)
    }

    /// Rank visible chunks against a query.
    ///
    /// Uses vector mode when a durable store and an embedder are both
    /// available, lexical mode otherwise or when vector search fails.
    #[instrument(skip(self, query, embedder), fields(owner = ?query.owner_id, limit = query.limit))]
    pub async fn search_documents(
        &self,
        query: SearchQuery,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> SearchResponse {
        let started = Instant::now();

        let query = match self.validate(query) {
            Ok(query) => query,
            Err(e) => return Self::search_failed(&e),
        };

        match self.search(&query, embedder).await {
            Ok(outcome) => {
                metrics::record_search(
                    started.elapsed().as_secs_f64(),
                    outcome.mode.as_str(),
                    outcome.results.len(),
                );

                info!(
                    mode = outcome.mode.as_str(),
                    result_count = outcome.results.len(),
                    "Search complete"
                );

                SearchResponse {
                    success: true,
                    results: outcome.results.into_iter().map(SearchResult::from).collect(),
                    mode: Some(outcome.mode),
                    message: outcome.message,
                    error: None,
                    code: None,
                }
            }
            Err(e) => {
                error!(error = %e, "Search failed");
                Self::search_failed(&e)
            }
        }
    }

    async fn search(
        &self,
        query: &SearchQuery,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Result<Outcome> {
        if let Some(embedder) = embedder.filter(|_| self.store.has_durable()) {
            let retriever = VectorRetriever::new(self.store.clone(), embedder);
            match retriever.retrieve(query).await {
                Ok(results) => {
                    let message = results.is_empty().then(|| NO_MATCH_MESSAGE.to_string());
                    return Ok(Outcome {
                        results,
                        mode: RetrievalMode::Vector,
                        message,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Vector search failed, falling back to lexical search");
                    metrics::record_fallback("search");
                }
            }
        }

        let corpus = self.store.corpus(query.owner_id.as_deref()).await?;
        if corpus.is_empty() {
            return Ok(Outcome {
                results: Vec::new(),
                mode: RetrievalMode::Lexical,
                message: Some(EMPTY_CORPUS_MESSAGE.to_string()),
            });
        }

        let results = score_chunks(&query.query, corpus, query.threshold, query.limit);
        let message = results.is_empty().then(|| NO_MATCH_MESSAGE.to_string());

        Ok(Outcome {
            results,
            mode: RetrievalMode::Lexical,
            message,
        })
    }

    fn validate(&self, mut query: SearchQuery) -> Result<SearchQuery> {
        let trimmed = query.query.trim();
        if trimmed.is_empty() {
            return Err(AppError::validation("query", "query must not be empty"));
        }
        if trimmed.chars().count() > MAX_QUERY_CHARS {
            return Err(AppError::validation(
                "query",
                format!("query exceeds {} characters", MAX_QUERY_CHARS),
            ));
        }
        if query.limit == 0 {
            return Err(AppError::validation("limit", "limit must be at least 1"));
        }
        if !(0.0..=1.0).contains(&query.threshold) {
            return Err(AppError::validation("threshold", "threshold must be between 0 and 1"));
        }

        query.query = trimmed.to_string();
        query.limit = query.limit.min(self.settings.max_limit.max(1));
        Ok(query)
    }

    fn search_failed(error: &AppError) -> SearchResponse {
        SearchResponse {
            success: false,
            results: Vec::new(),
            mode: None,
            message: None,
            error: Some(error.to_string()),
            code: Some(error.code()),
        }
    }

    /// Aggregate statistics over the chunks visible to an owner
    #[instrument(skip(self))]
    pub async fn get_stats(&self, owner_id: Option<&str>) -> StatsResponse {
        let backend = if self.store.has_durable() {
            StoreBackend::Durable
        } else {
            StoreBackend::Fallback
        };

        match self.store.corpus(owner_id).await {
            Ok(corpus) => StatsResponse {
                success: true,
                stats: Some(aggregate(&corpus, Utc::now())),
                backend: Some(backend),
                error: None,
                code: None,
            },
            Err(e) => {
                error!(error = %e, "Stats unavailable");
                StatsResponse {
                    success: false,
                    stats: None,
                    backend: None,
                    error: Some(e.to_string()),
                    code: Some(e.code()),
                }
            }
        }
    }

    /// Remove a document's chunks, scoped to an owner when given
    #[instrument(skip(self))]
    pub async fn delete_document_chunks(
        &self,
        document_id: &str,
        owner_id: Option<&str>,
    ) -> DeleteResponse {
        let result = if document_id.trim().is_empty() {
            Err(AppError::validation("document_id", "document id is required"))
        } else {
            self.store.delete_by_document(document_id, owner_id).await
        };

        match result {
            Ok(deleted) => {
                info!(deleted, "Document chunks deleted");
                DeleteResponse {
                    success: true,
                    deleted,
                    error: None,
                    code: None,
                }
            }
            Err(e) => {
                error!(error = %e, "Delete failed");
                DeleteResponse {
                    success: false,
                    deleted: 0,
                    error: Some(e.to_string()),
                    code: Some(e.code()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docchat_common::embeddings::MockEmbedder;
    use docchat_common::store::{ChunkStore, LocalChunkStore};
    use docchat_common::types::DocumentChunk;

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(AppError::Embedding {
                message: "credential rejected".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "broken"
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    fn chunk(document_id: &str, index: i32, text: &str, owner: Option<&str>) -> DocumentChunk {
        DocumentChunk::new(document_id, "file.txt", text, index, owner.map(str::to_string))
    }

    fn service(store: StoreRouter) -> SearchService {
        SearchService::new(Arc::new(store), SearchSettings::default())
    }

    async fn fallback_service(chunks: Vec<DocumentChunk>) -> SearchService {
        let store = LocalChunkStore::in_memory();
        store.save(chunks).await.unwrap();
        service(StoreRouter::local_only(Arc::new(store)))
    }

    #[tokio::test]
    async fn test_budget_report_scenario() {
        let service = fallback_service(vec![
            chunk("doc1", 0, "Annual budget report summary", None),
            chunk("doc2", 0, "Recipes for a rainy afternoon", None),
        ])
        .await;

        let response = service
            .search_documents(SearchQuery::new("budget report").limit(5).threshold(0.5), None)
            .await;

        assert!(response.success);
        assert_eq!(response.mode, Some(RetrievalMode::Lexical));
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].document_id, "doc1");
        assert!((response.results[0].similarity - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_empty_corpus_is_success_with_message() {
        let service = fallback_service(Vec::new()).await;
        let response = service
            .search_documents(SearchQuery::new("anything at all"), None)
            .await;

        assert!(response.success);
        assert!(response.results.is_empty());
        assert_eq!(response.message.as_deref(), Some(EMPTY_CORPUS_MESSAGE));
    }

    #[tokio::test]
    async fn test_ownership_isolation() {
        let service = fallback_service(vec![
            chunk("doc1", 0, "secret budget plans", Some("A")),
            chunk("doc2", 0, "public budget plans", None),
        ])
        .await;

        let as_b = service
            .search_documents(SearchQuery::new("budget plans").owner("B").threshold(0.0), None)
            .await;
        assert!(as_b.success);
        assert!(as_b.results.is_empty());

        let as_a = service
            .search_documents(SearchQuery::new("budget plans").owner("A"), None)
            .await;
        assert_eq!(as_a.results.len(), 1);
        assert_eq!(as_a.results[0].document_id, "doc1");
    }

    #[tokio::test]
    async fn test_threshold_monotonic_through_service() {
        let service = fallback_service(vec![
            chunk("doc1", 0, "quarterly budget report", None),
            chunk("doc2", 0, "quarterly planning", None),
            chunk("doc3", 0, "budget", None),
        ])
        .await;

        let mut previous = usize::MAX;
        for threshold in [0.0, 0.2, 0.34, 0.5, 0.67, 0.9, 1.0] {
            let response = service
                .search_documents(
                    SearchQuery::new("quarterly budget report").threshold(threshold),
                    None,
                )
                .await;
            assert!(response.results.len() <= previous);
            previous = response.results.len();
        }
    }

    #[tokio::test]
    async fn test_vector_mode_with_durable_store() {
        let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(256));
        let durable = LocalChunkStore::in_memory().keep_embeddings();

        let mut relevant = chunk("doc1", 0, "annual budget report", None);
        relevant.embedding = Some(embedder.embed("annual budget report").await.unwrap());
        let mut other = chunk("doc2", 0, "weekend hiking trails", None);
        other.embedding = Some(embedder.embed("weekend hiking trails").await.unwrap());
        durable.save(vec![relevant, other]).await.unwrap();

        let service = service(StoreRouter::new(
            Some(Arc::new(durable)),
            Arc::new(LocalChunkStore::in_memory()),
        ));

        let response = service
            .search_documents(SearchQuery::new("annual budget report"), Some(embedder))
            .await;

        assert!(response.success);
        assert_eq!(response.mode, Some(RetrievalMode::Vector));
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].document_id, "doc1");
    }

    #[tokio::test]
    async fn test_vector_mode_ownership_isolation() {
        let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(256));
        let durable = LocalChunkStore::in_memory().keep_embeddings();

        let mut owned = chunk("doc1", 0, "annual budget report", Some("A"));
        owned.embedding = Some(embedder.embed("annual budget report").await.unwrap());
        let mut unowned = chunk("doc2", 0, "annual budget report", None);
        unowned.embedding = owned.embedding.clone();
        durable.save(vec![owned, unowned]).await.unwrap();

        let service = service(StoreRouter::new(
            Some(Arc::new(durable)),
            Arc::new(LocalChunkStore::in_memory()),
        ));
        let search = |owner: Option<&str>| {
            let mut query = SearchQuery::new("annual budget report").threshold(0.0);
            if let Some(owner) = owner {
                query = query.owner(owner);
            }
            service.search_documents(query, Some(embedder.clone()))
        };

        let as_a = search(Some("A")).await;
        assert_eq!(as_a.mode, Some(RetrievalMode::Vector));
        assert_eq!(as_a.results.len(), 1);
        assert_eq!(as_a.results[0].document_id, "doc1");

        let as_b = search(Some("B")).await;
        assert_eq!(as_b.mode, Some(RetrievalMode::Vector));
        assert!(as_b.results.is_empty());

        let anonymous = search(None).await;
        assert_eq!(anonymous.results.len(), 1);
        assert_eq!(anonymous.results[0].document_id, "doc2");
    }

    #[tokio::test]
    async fn test_vector_mode_skips_fallback_chunks() {
        let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(256));
        let fallback = LocalChunkStore::in_memory();
        fallback
            .save(vec![chunk("doc1", 0, "annual budget report", None)])
            .await
            .unwrap();

        let service = service(StoreRouter::new(
            Some(Arc::new(LocalChunkStore::in_memory().keep_embeddings())),
            Arc::new(fallback),
        ));

        let vector = service
            .search_documents(SearchQuery::new("budget report"), Some(embedder))
            .await;
        assert_eq!(vector.mode, Some(RetrievalMode::Vector));
        assert!(vector.results.is_empty());

        let lexical = service
            .search_documents(SearchQuery::new("budget report"), None)
            .await;
        assert_eq!(lexical.mode, Some(RetrievalMode::Lexical));
        assert_eq!(lexical.results.len(), 1);
    }

    #[tokio::test]
    async fn test_embedding_failure_degrades_to_lexical() {
        let durable = LocalChunkStore::in_memory().keep_embeddings();
        durable
            .save(vec![chunk("doc1", 0, "annual budget report", None)])
            .await
            .unwrap();

        let service = service(StoreRouter::new(
            Some(Arc::new(durable)),
            Arc::new(LocalChunkStore::in_memory()),
        ));
        let broken: Arc<dyn Embedder> = Arc::new(BrokenEmbedder);

        let response = service
            .search_documents(SearchQuery::new("budget report"), Some(broken))
            .await;

        assert!(response.success);
        assert_eq!(response.mode, Some(RetrievalMode::Lexical));
        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn test_query_validation() {
        let service = fallback_service(Vec::new()).await;

        for query in [
            SearchQuery::new("   "),
            SearchQuery::new("x".repeat(MAX_QUERY_CHARS + 1)),
            SearchQuery::new("budget").limit(0),
            SearchQuery::new("budget").threshold(1.5),
            SearchQuery::new("budget").threshold(f32::NAN),
        ] {
            let response = service.search_documents(query, None).await;
            assert!(!response.success);
            assert!(response.error.is_some());
            assert_eq!(response.code, Some(ErrorCode::ValidationError));
        }
    }

    #[tokio::test]
    async fn test_stats_on_empty_corpus() {
        let service = fallback_service(Vec::new()).await;
        let response = service.get_stats(None).await;

        assert!(response.success);
        assert_eq!(response.backend, Some(StoreBackend::Fallback));
        let stats = response.stats.unwrap();
        assert_eq!(stats.total_documents, 0);
        assert_eq!(stats.total_chunks, 0);
        assert_eq!(stats.avg_chunk_size, 0.0);
    }

    #[tokio::test]
    async fn test_delete_then_stats() {
        let service = fallback_service(vec![
            chunk("doc1", 0, "first document part one", None),
            chunk("doc1", 1, "first document part two", None),
            chunk("doc2", 0, "second document", None),
        ])
        .await;

        let before = service.get_stats(None).await.stats.unwrap();
        let deleted = service.delete_document_chunks("doc1", None).await;
        let after = service.get_stats(None).await.stats.unwrap();

        assert!(deleted.success);
        assert_eq!(deleted.deleted, 2);
        assert_eq!(after.total_documents, before.total_documents - 1);
        assert_eq!(after.total_chunks, 1);
    }

    #[tokio::test]
    async fn test_delete_requires_document_id() {
        let service = fallback_service(Vec::new()).await;
        let response = service.delete_document_chunks("  ", None).await;
        assert!(!response.success);
    }

    #[tokio::test]
    async fn test_limit_clamped_to_max() {
        let chunks = (0..150).map(|i| chunk("doc1", i, "budget line", None)).collect();
        let service = fallback_service(chunks).await;

        let response = service
            .search_documents(SearchQuery::new("budget").limit(1000), None)
            .await;
        assert_eq!(response.results.len(), 100);
    }
}
