//! docchat API Gateway
//!
//! HTTP surface over the document chunk and search core.
//! Handles:
//! - Document indexing and deletion
//! - Search and corpus statistics
//! - Health and readiness checks
//! - Observability (logging, Prometheus metrics)

mod extract;
mod handlers;

use anyhow::Context;
use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    BoxError, Router,
};
use docchat_common::{
    config::AppConfig,
    embeddings::{create_embedder, Embedder},
    errors::{AppError, Result},
    logging::init_tracing,
    metrics, StoreRouter,
};
use docchat_ingestion::DocumentProcessor;
use docchat_search::SearchService;
use extract::RequestContext;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<StoreRouter>,
    pub processor: Arc<DocumentProcessor>,
    pub search: Arc<SearchService>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, store: Arc<StoreRouter>) -> anyhow::Result<Self> {
        let processor = DocumentProcessor::new(store.clone(), &config)?;
        let search = SearchService::new(store.clone(), config.search.clone());

        Ok(Self {
            config,
            store,
            processor: Arc::new(processor),
            search: Arc::new(search),
        })
    }

    /// Embedder for a request: its own credential first, then the configured one
    pub fn embedder_for(&self, ctx: &RequestContext) -> Result<Option<Arc<dyn Embedder>>> {
        create_embedder(&self.config.embedding, ctx.embedding_key.clone())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;
    let config = Arc::new(config);

    init_tracing(&config.observability)?;

    info!("Starting docchat API Gateway v{}", docchat_common::VERSION);

    // Initialize metrics
    install_metrics_exporter(&config)?;
    metrics::register_metrics();

    // Select storage backends once
    let store = Arc::new(StoreRouter::from_config(&config).await?);
    if !store.has_durable() {
        warn!("Running without a durable store, chunks are kept in the fallback store");
    }

    let state = AppState::new(config.clone(), store)?;

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Serve Prometheus metrics on their own port; port 0 disables the exporter
fn install_metrics_exporter(config: &AppConfig) -> anyhow::Result<()> {
    let port = config.observability.metrics_port;
    if port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("embedding_duration_seconds".to_string()),
            metrics::EMBEDDING_BUCKETS,
        )?
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let timeout = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(handle_timeout_error))
        .timeout(state.config.request_timeout());

    // API routes
    let api_routes = Router::new()
        // Documents
        .route(
            "/documents/{document_id}/index",
            post(handlers::documents::index_document),
        )
        .route(
            "/documents/{document_id}/chunks",
            delete(handlers::documents::delete_document_chunks),
        )
        // Search
        .route("/search", post(handlers::search::search))
        .route("/stats", get(handlers::stats::get_stats));

    // Compose the app
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(DefaultBodyLimit::max(state.config.server.max_body_bytes))
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

async fn handle_timeout_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::ServiceUnavailable {
            message: "request timed out".to_string(),
        }
    } else {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use docchat_common::store::LocalChunkStore;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let mut config = AppConfig::default();
        config.embedding.request_delay_ms = 0;
        let store = Arc::new(StoreRouter::local_only(Arc::new(LocalChunkStore::in_memory())));
        create_router(AppState::new(Arc::new(config), store).unwrap())
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, owner: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::post(uri).header("content-type", "application/json");
        if let Some(owner) = owner {
            builder = builder.header("x-user-id", owner);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready_without_database() {
        let (status, body) = send(&app(), Request::get("/ready").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["fallback_store"]["status"], "up");
        assert!(body["checks"].get("database").is_none());
    }

    #[tokio::test]
    async fn test_index_search_stats_delete() {
        let app = app();

        let (status, body) = send(
            &app,
            post_json(
                "/v1/documents/doc1/index",
                Some("A"),
                json!({ "file_name": "budget.txt", "text": "Annual budget report summary" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["chunk_count"], 1);
        assert_eq!(body["backend"], "fallback");

        let (status, body) = send(
            &app,
            post_json("/v1/search", Some("A"), json!({ "query": "budget report", "limit": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "lexical");
        assert_eq!(body["results"].as_array().unwrap().len(), 1);

        let (_, body) = send(
            &app,
            post_json("/v1/search", Some("B"), json!({ "query": "budget report" })),
        )
        .await;
        assert!(body["results"].as_array().unwrap().is_empty());

        let stats = Request::get("/v1/stats")
            .header("x-user-id", "A")
            .body(Body::empty())
            .unwrap();
        let (_, body) = send(&app, stats).await;
        assert_eq!(body["stats"]["total_documents"], 1);

        let delete = Request::delete("/v1/documents/doc1/chunks")
            .header("x-user-id", "A")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, delete).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], 1);
    }

    #[tokio::test]
    async fn test_invalid_bodies_are_rejected() {
        let app = app();

        let (status, body) = send(&app, post_json("/v1/search", None, json!({ "query": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _) = send(
            &app,
            post_json("/v1/search", None, json!({ "query": "budget", "threshold": 2.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            post_json(
                "/v1/documents/doc1/index",
                None,
                json!({ "file_name": "empty.txt", "text": "" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_blank_text_and_query_are_bad_requests() {
        let app = app();

        let (status, body) = send(
            &app,
            post_json(
                "/v1/documents/doc1/index",
                None,
                json!({ "file_name": "blank.txt", "text": "   " }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, body) =
            send(&app, post_json("/v1/search", None, json!({ "query": "   " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_reindex_replaces_chunks() {
        let app = app();
        let body = json!({ "file_name": "budget.txt", "text": "Annual budget report summary" });

        for _ in 0..2 {
            let (status, _) = send(
                &app,
                post_json("/v1/documents/doc1/index", Some("A"), body.clone()),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let stats = Request::get("/v1/stats")
            .header("x-user-id", "A")
            .body(Body::empty())
            .unwrap();
        let (_, body) = send(&app, stats).await;
        assert_eq!(body["stats"]["total_documents"], 1);
        assert_eq!(body["stats"]["total_chunks"], 1);
    }
}
