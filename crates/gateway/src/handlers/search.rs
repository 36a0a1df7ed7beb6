//! Search handler

use super::{status_for, validation_error};
use crate::extract::RequestContext;
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use docchat_common::errors::Result;
use docchat_search::SearchResponse;
use serde::Deserialize;
use validator::Validate;

/// Search request
#[derive(Debug, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, max = 1000))]
    pub query: String,

    /// Maximum results, defaults to `search.default_limit`
    #[validate(range(min = 1))]
    pub limit: Option<usize>,

    /// Minimum score, defaults to `search.default_threshold`
    #[validate(range(min = 0.0, max = 1.0))]
    pub threshold: Option<f32>,
}

/// Perform a search
pub async fn search(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<SearchRequest>,
) -> Result<(StatusCode, Json<SearchResponse>)> {
    request.validate().map_err(validation_error)?;

    let mut query = state.search.query(request.query);
    if let Some(limit) = request.limit {
        query = query.limit(limit);
    }
    if let Some(threshold) = request.threshold {
        query = query.threshold(threshold);
    }
    if let Some(owner) = ctx.owner() {
        query = query.owner(owner);
    }

    let embedder = state.embedder_for(&ctx)?;
    let response = state.search.search_documents(query, embedder).await;

    Ok((status_for(response.success, response.code), Json(response)))
}
