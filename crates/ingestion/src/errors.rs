//! Ingestion error types

use docchat_common::errors::{AppError, ErrorCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Validation error on {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("Chunking produced no content for document {0}")]
    EmptyDocument(String),

    #[error("Classification error: {0}")]
    ClassificationError(String),

    #[error("Store error: {0}")]
    StoreError(#[from] AppError),
}

impl IngestionError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        IngestionError::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            IngestionError::ValidationError { .. } | IngestionError::EmptyDocument(_) => {
                ErrorCode::ValidationError
            }
            IngestionError::ClassificationError(_) => ErrorCode::InternalError,
            IngestionError::StoreError(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            IngestionError::validation("text", "empty").code(),
            ErrorCode::ValidationError
        );
        let store = IngestionError::from(AppError::StoreWrite {
            backend: "local".to_string(),
            message: "disk full".to_string(),
        });
        assert_eq!(store.code(), ErrorCode::StoreWriteError);
    }
}
