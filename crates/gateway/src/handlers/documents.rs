//! Document indexing and deletion handlers

use super::{status_for, validation_error};
use crate::extract::RequestContext;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use docchat_common::errors::{AppError, ErrorCode, Result};
use docchat_common::store::StoreBackend;
use docchat_common::types::DocumentChunk;
use docchat_search::DeleteResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Index request
#[derive(Debug, Deserialize, Validate)]
pub struct IndexRequest {
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,

    /// Extracted document text
    #[validate(length(min = 1))]
    pub text: String,
}

#[derive(Serialize)]
pub struct IndexResponse {
    pub success: bool,
    pub document_id: String,
    pub chunk_count: usize,
    pub embedded: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<StoreBackend>,
    pub chunks: Vec<IndexedChunk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

/// Stored chunk without its text or vector
#[derive(Serialize)]
pub struct IndexedChunk {
    pub id: Uuid,
    pub chunk_index: i32,
    pub chunk_size: i32,
    pub has_embedding: bool,
}

impl From<&DocumentChunk> for IndexedChunk {
    fn from(chunk: &DocumentChunk) -> Self {
        Self {
            id: chunk.id,
            chunk_index: chunk.chunk_index,
            chunk_size: chunk.chunk_size,
            has_embedding: chunk.has_embedding(),
        }
    }
}

/// Chunk, embed and store a document's text
pub async fn index_document(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(document_id): Path<String>,
    Json(request): Json<IndexRequest>,
) -> Result<(StatusCode, Json<IndexResponse>)> {
    request.validate().map_err(validation_error)?;

    if document_id.trim().is_empty() {
        return Err(AppError::validation("document_id", "document id is required"));
    }

    let embedder = state.embedder_for(&ctx)?;

    let response = state
        .processor
        .process_document_for_search(
            &document_id,
            &request.file_name,
            &request.text,
            ctx.owner(),
            embedder,
        )
        .await;

    let status = if response.success {
        StatusCode::CREATED
    } else {
        status_for(false, response.code)
    };

    Ok((
        status,
        Json(IndexResponse {
            success: response.success,
            document_id,
            chunk_count: response.chunks.len(),
            embedded: response.embedded,
            backend: response.backend,
            chunks: response.chunks.iter().map(IndexedChunk::from).collect(),
            error: response.error,
            code: response.code,
        }),
    ))
}

/// Delete a document's chunks visible to the caller
pub async fn delete_document_chunks(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(document_id): Path<String>,
) -> (StatusCode, Json<DeleteResponse>) {
    let response = state
        .search
        .delete_document_chunks(&document_id, ctx.owner())
        .await;
    (status_for(response.success, response.code), Json(response))
}
