//! API Module
//!
//! HTTP veneer over the cache engine.
//!
//! # Endpoints
//! - `GET /v1/cache/:key` - Retrieve a value
//! - `PUT /v1/cache/:key` - Store a value
//! - `DELETE /v1/cache/:key` - Delete a key
//! - `GET /v1/status` - Cache status

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
