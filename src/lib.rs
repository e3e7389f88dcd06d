//! Cache Server - A sharded in-memory cache server
//!
//! Provides TTL expiration with sliding renewal, per-shard memory quotas,
//! periodic snapshots and a binary TCP protocol, with a thin HTTP front end.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod proto;
pub mod tasks;
pub mod tcp;

pub use api::AppState;
pub use cache::{CacheEngine, Status};
pub use config::{CacheOptions, Config, ServerType};
pub use error::{CacheError, Result};
pub use tasks::{spawn_dump_task, spawn_gc_task};
pub use tcp::{AsyncClient, TcpClient, TcpServer};
