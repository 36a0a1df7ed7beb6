//! API handlers module

pub mod documents;
pub mod health;
pub mod search;
pub mod stats;

use axum::http::StatusCode;
use docchat_common::errors::{AppError, ErrorCode};
use validator::ValidationErrors;

/// Status for a structured operation response.
///
/// Client errors keep their own status; any other failure is reported as
/// 503 since the store or embedding backend could not serve it.
fn status_for(success: bool, code: Option<ErrorCode>) -> StatusCode {
    if success {
        return StatusCode::OK;
    }

    match code.map(|c| c.status_code()) {
        Some(status) if status.is_client_error() => status,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn validation_error(errors: ValidationErrors) -> AppError {
    let field = errors.field_errors().keys().next().map(|f| f.to_string());
    AppError::Validation {
        message: errors.to_string(),
        field,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_status_follows_code() {
        assert_eq!(status_for(true, None), StatusCode::OK);
        assert_eq!(
            status_for(false, Some(ErrorCode::ValidationError)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(false, Some(ErrorCode::StoreWriteError)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_for(false, None), StatusCode::SERVICE_UNAVAILABLE);
    }
}
