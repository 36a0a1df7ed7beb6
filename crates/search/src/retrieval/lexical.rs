//! Lexical search
//!
//! Scores every visible chunk by the fraction of query words it contains.
//! Words shorter than three characters are ignored; a query with no
//! qualifying words scores zero everywhere.

use docchat_common::types::{DocumentChunk, ScoredChunk};
use std::cmp::Ordering;

/// Lower-cased query words longer than two characters
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|word| word.chars().count() > 2)
        .collect()
}

/// Score, filter, sort and truncate `chunks` against `query`
pub fn score_chunks(
    query: &str,
    chunks: Vec<DocumentChunk>,
    threshold: f32,
    limit: usize,
) -> Vec<ScoredChunk> {
    let terms = query_terms(query);

    let mut scored: Vec<ScoredChunk> = chunks
        .into_iter()
        .map(|chunk| {
            let score = overlap_score(&terms, &chunk.chunk_text);
            ScoredChunk { chunk, score }
        })
        .filter(|scored| scored.score >= threshold)
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk.document_id.cmp(&b.chunk.document_id))
            .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
    });
    scored.truncate(limit);
    scored
}

fn overlap_score(terms: &[String], text: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }

    let haystack = text.to_lowercase();
    let matched = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
    matched as f32 / terms.len() as f32
}
