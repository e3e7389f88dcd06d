//! Cache Shard Module
//!
//! An independently locked partition of the key space. Every read and write
//! of a shard's map and its accounting happens under the shard's lock.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::cache::snapshot::{EntryRecord, ShardRecord};
use crate::cache::{current_timestamp_ms, Entry, Status};
use crate::error::{CacheError, Result};

#[derive(Debug, Default)]
struct ShardData {
    entries: HashMap<String, Entry>,
    status: Status,
}

impl ShardData {
    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.status.sub_entry(key, entry.payload());
                true
            }
            None => false,
        }
    }
}

// == Shard ==
/// A lockable partition holding entries and their accounting.
#[derive(Debug)]
pub struct Shard {
    data: RwLock<ShardData>,
    /// Maximum bytes of keys plus values this shard may hold
    quota: u64,
}

impl Shard {
    // == Constructor ==
    /// Creates an empty shard.
    ///
    /// # Arguments
    /// * `quota` - Byte quota for keys plus values
    /// * `capacity` - Initial map capacity
    pub fn new(quota: u64, capacity: usize) -> Self {
        Self {
            data: RwLock::new(ShardData {
                entries: HashMap::with_capacity(capacity),
                status: Status::new(),
            }),
            quota,
        }
    }

    /// Returns the byte quota of this shard.
    pub fn quota(&self) -> u64 {
        self.quota
    }

    // == Get ==
    /// Retrieves a payload by key, refreshing its last touch.
    ///
    /// An expired entry is removed on the spot and reported as absent.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        {
            let data = self.data.read().await;
            match data.entries.get(key) {
                None => return None,
                Some(entry) if entry.is_alive() => return Some(entry.visit()),
                Some(_) => {}
            }
        }

        let mut data = self.data.write().await;
        // Another writer may have replaced the entry between the two locks
        let expired = data
            .entries
            .get(key)
            .map(|entry| !entry.is_alive())
            .unwrap_or(false);
        if expired {
            data.remove(key);
        }
        None
    }

    // == Set ==
    /// Stores a copy of `payload` under `key`.
    ///
    /// Fails with [`CacheError::CapacityExceeded`] when the new entry would
    /// push the shard over its quota; the previous value is kept in that case.
    pub async fn set(&self, key: &str, payload: &[u8], ttl: u64) -> Result<()> {
        let mut data = self.data.write().await;

        let replaced = data
            .entries
            .get(key)
            .map(|old| (key.len() + old.payload().len()) as u64)
            .unwrap_or(0);
        let needed = data.status.entry_size() - replaced + (key.len() + payload.len()) as u64;
        if needed > self.quota {
            return Err(CacheError::CapacityExceeded {
                key: key.to_string(),
                quota: self.quota,
            });
        }

        data.remove(key);
        data.status.add_entry(key, payload);
        data.entries.insert(key.to_string(), Entry::new(payload, ttl));
        Ok(())
    }

    // == Delete ==
    /// Removes an entry by key. Absent keys are ignored.
    pub async fn delete(&self, key: &str) {
        self.data.write().await.remove(key);
    }

    // == Status ==
    /// Returns a copy of the shard's accounting.
    pub async fn status(&self) -> Status {
        self.data.read().await.status
    }

    // == Sweep Expired ==
    /// Removes at most `max_removals` expired entries.
    ///
    /// Returns the number of entries removed.
    pub async fn sweep_expired(&self, max_removals: usize) -> usize {
        let mut data = self.data.write().await;
        let now = current_timestamp_ms();

        let expired: Vec<String> = data
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_alive_at(now))
            .map(|(key, _)| key.clone())
            .take(max_removals)
            .collect();

        for key in &expired {
            data.remove(key);
        }
        expired.len()
    }

    // == Snapshot Support ==
    /// Copies the shard's contents into a snapshot record.
    pub(crate) async fn to_record(&self) -> ShardRecord {
        let data = self.data.read().await;
        ShardRecord {
            entries: data
                .entries
                .iter()
                .map(|(key, entry)| EntryRecord {
                    key: key.clone(),
                    payload: entry.payload().to_vec(),
                    ttl: entry.ttl(),
                    last_touch: entry.last_touch(),
                })
                .collect(),
            status: data.status,
        }
    }

    /// Rebuilds a shard from a snapshot record.
    ///
    /// Fails when the stored accounting disagrees with the stored entries.
    pub(crate) fn from_record(record: ShardRecord, quota: u64) -> Result<Self> {
        let mut data = ShardData {
            entries: HashMap::with_capacity(record.entries.len()),
            status: Status::new(),
        };
        for entry in record.entries {
            data.status.add_entry(&entry.key, &entry.payload);
            let restored = Entry::with_touch(Bytes::from(entry.payload), entry.ttl, entry.last_touch);
            if data.entries.insert(entry.key, restored).is_some() {
                return Err(CacheError::CorruptSnapshot("duplicate key in shard".to_string()));
            }
        }
        if data.status != record.status {
            return Err(CacheError::CorruptSnapshot(format!(
                "shard accounting {:?} does not match its entries {:?}",
                record.status, data.status
            )));
        }
        Ok(Self {
            data: RwLock::new(data),
            quota,
        })
    }

    // == Length ==
    /// Returns the number of stored entries, expired or not.
    pub async fn len(&self) -> usize {
        self.data.read().await.entries.len()
    }

    /// Returns true if the shard holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
