//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{delete_handler, get_handler, set_handler, status_handler, AppState};

/// API version prefix of every route.
pub const API_VERSION: &str = "v1";

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /v1/cache/:key` - Retrieve a value
/// - `PUT /v1/cache/:key` - Store the request body (TTL from the `Ttl` header)
/// - `DELETE /v1/cache/:key` - Delete a key
/// - `GET /v1/status` - Entry count and byte usage
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            &format!("/{}/cache/:key", API_VERSION),
            get(get_handler).put(set_handler).delete(delete_handler),
        )
        .route(&format!("/{}/status", API_VERSION), get(status_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheEngine;
    use crate::config::CacheOptions;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let engine = CacheEngine::new(CacheOptions {
            shard_count: 4,
            max_memory_mb: 1,
            ..CacheOptions::default()
        })
        .unwrap();
        create_router(AppState::new(Arc::new(engine)))
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/v1/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_put_endpoint() {
        let response = create_test_app()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/v1/cache/test")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let response = create_test_app()
            .oneshot(
                Request::builder()
                    .uri("/v1/cache/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/v2/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
