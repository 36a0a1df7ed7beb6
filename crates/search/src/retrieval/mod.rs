//! Chunk retrieval
//!
//! Two retrieval modes:
//! - Vector search (cosine similarity via the durable store)
//! - Lexical search (fraction of query words found in the chunk)
//!
//! Scores from the two modes are not on the same scale. A lexical 0.5
//! means half the query words appear; a vector 0.5 is a cosine value.
//! Responses carry the [`RetrievalMode`] so callers can tell them apart.

mod lexical;
mod vector;

pub use lexical::{query_terms, score_chunks};
pub use vector::VectorRetriever;

use serde::{Deserialize, Serialize};

/// Maximum query length in characters
pub const MAX_QUERY_CHARS: usize = 1000;

/// Retrieval mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Vector similarity search
    Vector,
    /// Word-overlap search
    Lexical,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Vector => "vector",
            RetrievalMode::Lexical => "lexical",
        }
    }
}

/// Search request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Query text
    pub query: String,

    /// Restrict results to this owner's chunks
    pub owner_id: Option<String>,

    /// Maximum results to return
    pub limit: usize,

    /// Minimum score, inclusive
    pub threshold: f32,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            owner_id: None,
            limit: 10,
            threshold: 0.5,
        }
    }
}
