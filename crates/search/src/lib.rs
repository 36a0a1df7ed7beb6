//! docchat search
//!
//! Similarity search, corpus statistics and deletion over the chunk store.
//!
//! Vector mode needs both a durable store and an embedder. Without either,
//! or when the query cannot be embedded, search runs in lexical mode. The
//! two modes score on different scales, so every [`SearchResponse`] names
//! the [`RetrievalMode`] it used.

pub mod retrieval;
pub mod service;
pub mod stats;

pub use retrieval::{RetrievalMode, SearchQuery};
pub use service::{DeleteResponse, SearchResponse, SearchService, StatsResponse};
pub use stats::{aggregate, CorpusStats};
