//! Health check handlers

use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<CheckResult>,
    pub fallback_store: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<(), String>> for CheckResult {
    fn from(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => CheckResult {
                status: "up".to_string(),
                error: None,
            },
            Err(e) => CheckResult {
                status: "down".to_string(),
                error: Some(e),
            },
        }
    }
}

/// Liveness check; healthy whenever the server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: docchat_common::VERSION.to_string(),
    })
}

/// Readiness check.
///
/// A down database still reports ready while the fallback store is up,
/// since writes and reads degrade to it.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let health = state.store.health().await;

    let checks = HealthChecks {
        database: health.durable.map(CheckResult::from),
        fallback_store: CheckResult::from(health.fallback),
    };

    let ready = checks.fallback_store.status == "up";
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyResponse {
            status: if ready { "ready" } else { "not_ready" }.to_string(),
            checks,
        }),
    )
}
