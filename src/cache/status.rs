//! Cache Status Module
//!
//! Running accounting of entry count and key/value bytes.

use serde::{Deserialize, Serialize};

// == Status ==
/// Entry count and byte usage of a shard, or of the whole engine when summed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    /// Number of live entries
    pub count: u64,
    /// Total bytes of all keys
    pub key_size: u64,
    /// Total bytes of all values
    pub value_size: u64,
}

impl Status {
    // == Constructor ==
    /// Creates a new Status with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts for a stored entry.
    pub fn add_entry(&mut self, key: &str, value: &[u8]) {
        self.count += 1;
        self.key_size += key.len() as u64;
        self.value_size += value.len() as u64;
    }

    /// Accounts for a removed entry.
    pub fn sub_entry(&mut self, key: &str, value: &[u8]) {
        self.count -= 1;
        self.key_size -= key.len() as u64;
        self.value_size -= value.len() as u64;
    }

    /// Bytes used by keys and values together.
    pub fn entry_size(&self) -> u64 {
        self.key_size + self.value_size
    }

    /// Adds another status into this one.
    pub fn merge(&mut self, other: &Status) {
        self.count += other.count;
        self.key_size += other.key_size;
        self.value_size += other.value_size;
    }
}
