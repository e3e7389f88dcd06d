//! Cache Module
//!
//! Provides a sharded in-memory cache with sliding TTL expiration, per-shard
//! memory quotas, garbage collection and snapshot persistence.

mod engine;
mod entry;
mod shard;
pub mod snapshot;
mod status;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use engine::{hash_key, CacheEngine, GateGuard, SnapshotGate};
pub use entry::{current_timestamp_ms, Entry, NEVER_EXPIRE};
pub use shard::Shard;
pub use status::Status;
