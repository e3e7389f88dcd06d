//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::cache::{CacheEngine, Status, NEVER_EXPIRE};
use crate::error::{CacheError, Result};

/// Header carrying the TTL in seconds for `PUT` (matched case-insensitively).
pub const TTL_HEADER: &str = "ttl";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache engine
    pub engine: Arc<CacheEngine>,
}

impl AppState {
    /// Creates a new AppState around the given engine.
    pub fn new(engine: Arc<CacheEngine>) -> Self {
        Self { engine }
    }
}

/// Reads the TTL header; absent means the entry never expires.
pub fn parse_ttl(headers: &HeaderMap) -> Result<u64> {
    match headers.get(TTL_HEADER) {
        None => Ok(NEVER_EXPIRE),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| CacheError::InvalidRequest("invalid Ttl header".to_string())),
    }
}

/// Handler for GET /v1/cache/:key
///
/// Returns the raw value bytes.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Bytes> {
    state
        .engine
        .get(&key)
        .await
        .ok_or(CacheError::NotFound(key))
}

/// Handler for PUT /v1/cache/:key
///
/// Stores the request body under the key, with the TTL from the `Ttl` header.
pub async fn set_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let ttl = parse_ttl(&headers)?;
    state.engine.set(&key, &body, ttl).await?;
    Ok(StatusCode::CREATED)
}

/// Handler for DELETE /v1/cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> StatusCode {
    state.engine.delete(&key).await;
    StatusCode::OK
}

/// Handler for GET /v1/status
pub async fn status_handler(State(state): State<AppState>) -> Json<Status> {
    Json(state.engine.status().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheOptions;
    use axum::http::HeaderValue;

    fn state() -> AppState {
        AppState::new(Arc::new(
            CacheEngine::new(CacheOptions {
                shard_count: 4,
                max_memory_mb: 1,
                ..CacheOptions::default()
            })
            .unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = state();

        let status = set_handler(
            State(state.clone()),
            Path("test_key".to_string()),
            HeaderMap::new(),
            Bytes::from_static(b"test_value"),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let value = get_handler(State(state), Path("test_key".to_string()))
            .await
            .unwrap();
        assert_eq!(value.as_ref(), b"test_value");
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let result = get_handler(State(state()), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = state();
        state.engine.set("to_delete", b"value", 0).await.unwrap();

        let status = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.engine.get("to_delete").await.is_none());
    }

    #[tokio::test]
    async fn test_status_handler() {
        let state = state();
        state.engine.set("ab", b"cde", 0).await.unwrap();

        let Json(status) = status_handler(State(state)).await;
        assert_eq!(status, Status { count: 1, key_size: 2, value_size: 3 });
    }

    #[test]
    fn test_parse_ttl() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_ttl(&headers).unwrap(), 0);

        headers.insert(TTL_HEADER, HeaderValue::from_static("30"));
        assert_eq!(parse_ttl(&headers).unwrap(), 30);

        headers.insert(TTL_HEADER, HeaderValue::from_static("soon"));
        assert!(matches!(parse_ttl(&headers), Err(CacheError::InvalidRequest(_))));
    }
}
