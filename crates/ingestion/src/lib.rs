//! docchat ingestion
//!
//! Chunking, classification and embedding of extracted document text,
//! persisted through [`docchat_common::store::StoreRouter`].

pub mod chunker;
pub mod classify;
pub mod errors;
pub mod processor;

pub use chunker::{chunk_spans, chunk_text, split, ChunkingConfig, TextChunk};
pub use classify::{ContentClassification, ContentClassifier, SensitivityLevel};
pub use errors::IngestionError;
pub use processor::{BackfillReport, DocumentProcessor, ProcessResponse};
