//! Corpus statistics

use chrono::{DateTime, Utc};
use docchat_common::types::DocumentChunk;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    /// Distinct document ids
    pub total_documents: usize,
    pub total_chunks: usize,
    /// Chunks carrying a vector
    pub total_embeddings: usize,
    /// Mean `chunk_size`, 0 when empty
    pub avg_chunk_size: f64,
    pub oldest_document: DateTime<Utc>,
    pub newest_document: DateTime<Utc>,
}

/// Aggregate stats over visible chunks; timestamps default to `now`
pub fn aggregate(chunks: &[DocumentChunk], now: DateTime<Utc>) -> CorpusStats {
    let total_chunks = chunks.len();

    let total_documents = chunks
        .iter()
        .map(|c| c.document_id.as_str())
        .collect::<HashSet<_>>()
        .len();

    let total_embeddings = chunks.iter().filter(|c| c.has_embedding()).count();

    let avg_chunk_size = if total_chunks == 0 {
        0.0
    } else {
        chunks.iter().map(|c| f64::from(c.chunk_size)).sum::<f64>() / total_chunks as f64
    };

    CorpusStats {
        total_documents,
        total_chunks,
        total_embeddings,
        avg_chunk_size,
        oldest_document: chunks.iter().map(|c| c.created_at).min().unwrap_or(now),
        newest_document: chunks.iter().map(|c| c.created_at).max().unwrap_or(now),
    }
}
