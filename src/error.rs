//! Error types for the cache server
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache server.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache (wire and HTTP surfaces only)
    #[error("not found")]
    NotFound(String),

    /// Storing the entry would push its shard over the memory quota
    #[error("the entry size will exceed if you set this entry (key: {key}, shard quota: {quota} bytes)")]
    CapacityExceeded { key: String, quota: u64 },

    /// Invalid request data
    #[error("{0}")]
    InvalidRequest(String),

    /// Invalid engine configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No handler registered for the command byte
    #[error("failed to find a handler of command {0}")]
    HandlerNotFound(u8),

    /// Protocol version byte did not match
    #[error("protocol version between client and server doesn't match (expected {expected}, got {found})")]
    VersionMismatch { expected: u8, found: u8 },

    /// Frame violates the wire format
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Error reply received from the server
    #[error("{0}")]
    Remote(String),

    /// Snapshot decoded but failed validation
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Status body encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Returns true for errors caused by the peer's connection going away.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            CacheError::Io(e) if matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
            )
        )
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::CapacityExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, format!("Error: {}", self)).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache server.
pub type Result<T> = std::result::Result<T, CacheError>;
