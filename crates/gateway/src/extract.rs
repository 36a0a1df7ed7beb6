//! Request context extractor
//!
//! Reads the optional owner (`X-User-ID`) and per-request embedding
//! credential (`X-Embedding-Key`) headers.

use axum::{extract::FromRequestParts, http::request::Parts};
use docchat_common::errors::{AppError, Result};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const EMBEDDING_KEY_HEADER: &str = "x-embedding-key";

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Owner the request acts for; `None` means unowned chunks
    pub owner_id: Option<String>,

    /// Embedding credential overriding the configured key
    pub embedding_key: Option<String>,
}

impl RequestContext {
    pub fn owner(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        Ok(Self {
            owner_id: header(parts, USER_ID_HEADER)?,
            embedding_key: header(parts, EMBEDDING_KEY_HEADER)?,
        })
    }
}

/// Trimmed header value; blank counts as absent
fn header(parts: &Parts, name: &str) -> Result<Option<String>> {
    let Some(value) = parts.headers.get(name) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| AppError::validation(name, "header is not valid UTF-8"))?
        .trim();

    Ok((!value.is_empty()).then(|| value.to_string()))
}
