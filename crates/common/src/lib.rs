//! docchat Common Library
//!
//! Shared code for the docchat crates including:
//! - Canonical chunk and search result types
//! - Chunk storage (Postgres/pgvector with a local fallback store)
//! - Embedding client abstraction
//! - Error types and handling
//! - Configuration management
//! - Tracing subscriber setup
//! - Metrics helpers

pub mod config;
pub mod db;
pub mod embeddings;
pub mod errors;
pub mod logging;
pub mod metrics;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use store::{ChunkStore, Persisted, StoreBackend, StoreRouter};
pub use types::{DocumentChunk, ScoredChunk, SearchResult};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
