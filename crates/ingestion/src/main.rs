//! docchat ingestion CLI
//!
//! Indexes a plain-text file for search, or back-fills missing embeddings:
//!
//! ```text
//! ingestion index <path> [document_id] [owner_id]
//! ingestion backfill [owner_id]
//! ```
//!
//! The embedding credential comes from configuration (`APP__EMBEDDING__API_KEY`).

use anyhow::{bail, Context};
use docchat_common::{
    config::AppConfig, embeddings::create_embedder, logging::init_tracing, StoreRouter, VERSION,
};
use docchat_ingestion::DocumentProcessor;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.observability)?;

    info!("Starting docchat ingestion v{}", VERSION);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!("usage: ingestion <index|backfill> ...");
    };

    let store = Arc::new(StoreRouter::from_config(&config).await?);
    let processor = DocumentProcessor::new(store.clone(), &config)?;
    let embedder = create_embedder(&config.embedding, None)?;

    match command.as_str() {
        "index" => {
            let Some(path) = args.get(1).map(Path::new) else {
                bail!("usage: ingestion index <path> [document_id] [owner_id]");
            };

            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;

            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "untitled".to_string());
            let document_id = args.get(2).cloned().unwrap_or_else(|| file_name.clone());
            let owner_id = args.get(3).map(String::as_str);

            if embedder.is_none() {
                warn!("No embedding credential configured, indexing text only");
            }

            let response = processor
                .process_document_for_search(&document_id, &file_name, &text, owner_id, embedder)
                .await;

            if !response.success {
                bail!(response.error.unwrap_or_else(|| "indexing failed".to_string()));
            }

            info!(
                document_id = %document_id,
                chunk_count = response.chunks.len(),
                embedded = response.embedded,
                backend = ?response.backend,
                "Indexing complete"
            );
        }
        "backfill" => {
            let Some(embedder) = embedder else {
                bail!("backfill requires an embedding credential");
            };
            let owner_id = args.get(1).map(String::as_str);

            let report = processor.backfill_embeddings(owner_id, embedder.as_ref()).await?;
            info!(updated = report.updated, failed = report.failed, "Back-fill complete");
        }
        other => bail!("unknown command: {other}"),
    }

    Ok(())
}
