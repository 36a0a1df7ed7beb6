//! Corpus statistics handler

use super::status_for;
use crate::extract::RequestContext;
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use docchat_search::StatsResponse;

/// Stats over the chunks visible to the caller
pub async fn get_stats(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> (StatusCode, Json<StatsResponse>) {
    let response = state.search.get_stats(ctx.owner()).await;
    (status_for(response.success, response.code), Json(response))
}
