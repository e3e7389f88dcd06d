//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with sliding TTL support.

use std::sync::atomic::{AtomicI64, Ordering};

use bytes::Bytes;

/// TTL value meaning the entry never expires.
pub const NEVER_EXPIRE: u64 = 0;

// == Cache Entry ==
/// Represents a single cache entry with payload and access metadata.
///
/// The TTL is measured from the last touch, so every successful read
/// extends the entry's life.
#[derive(Debug)]
pub struct Entry {
    /// The stored payload, owned by the entry
    payload: Bytes,
    /// Time to live in seconds, 0 = never expires
    ttl: u64,
    /// Last touch timestamp (Unix milliseconds)
    last_touch: AtomicI64,
}

impl Entry {
    // == Constructor ==
    /// Creates a new entry holding a private copy of `payload`.
    pub fn new(payload: &[u8], ttl: u64) -> Self {
        Self::with_touch(Bytes::copy_from_slice(payload), ttl, current_timestamp_ms())
    }

    /// Rebuilds an entry with a known last-touch time.
    pub(crate) fn with_touch(payload: Bytes, ttl: u64, last_touch: i64) -> Self {
        Self {
            payload,
            ttl,
            last_touch: AtomicI64::new(last_touch),
        }
    }

    // == Is Alive ==
    /// Checks whether the entry is still alive at `now` (Unix milliseconds).
    ///
    /// An entry dies once `ttl` whole seconds have passed since its last touch.
    pub fn is_alive_at(&self, now: i64) -> bool {
        if self.ttl == NEVER_EXPIRE {
            return true;
        }
        let elapsed = now.saturating_sub(self.last_touch());
        elapsed < (self.ttl as i64).saturating_mul(1000)
    }

    /// Checks whether the entry is alive right now.
    pub fn is_alive(&self) -> bool {
        self.is_alive_at(current_timestamp_ms())
    }

    // == Visit ==
    /// Refreshes the last-touch time and returns a cheap handle to the payload.
    pub fn visit(&self) -> Bytes {
        self.last_touch.store(current_timestamp_ms(), Ordering::Relaxed);
        self.payload.clone()
    }

    /// Borrows the payload without touching the entry.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Returns the TTL in seconds.
    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    /// Returns the last touch timestamp in Unix milliseconds.
    pub fn last_touch(&self) -> i64 {
        self.last_touch.load(Ordering::Relaxed)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
