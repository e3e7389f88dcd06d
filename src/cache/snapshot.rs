//! Snapshot Module
//!
//! Binary snapshot format for the whole engine, written to a temporary file
//! and renamed over the canonical path once complete.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::cache::Status;
use crate::config::CacheOptions;
use crate::error::{CacheError, Result};

/// Magic number for snapshot files: "CSNP"
pub const SNAPSHOT_MAGIC: u32 = 0x4353_4e50;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u16 = 1;

/// One persisted entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub key: String,
    pub payload: Vec<u8>,
    pub ttl: u64,
    /// Unix milliseconds
    pub last_touch: i64,
}

/// One persisted shard: its entries and its accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRecord {
    pub entries: Vec<EntryRecord>,
    pub status: Status,
}

/// Full engine state as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    magic: u32,
    version: u16,
    pub shard_count: usize,
    pub shards: Vec<ShardRecord>,
    pub options: CacheOptions,
}

impl Snapshot {
    pub fn new(shards: Vec<ShardRecord>, options: CacheOptions) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: SNAPSHOT_VERSION,
            shard_count: shards.len(),
            shards,
            options,
        }
    }

    /// Checks the header and the shard layout.
    pub fn validate(&self) -> Result<()> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(CacheError::CorruptSnapshot(format!(
                "invalid magic number: expected {:08x}, got {:08x}",
                SNAPSHOT_MAGIC, self.magic
            )));
        }
        if self.version != SNAPSHOT_VERSION {
            return Err(CacheError::CorruptSnapshot(format!(
                "unsupported snapshot version: {}",
                self.version
            )));
        }
        if self.shard_count != self.shards.len() || self.shard_count != self.options.shard_count {
            return Err(CacheError::CorruptSnapshot(format!(
                "shard count {} disagrees with {} stored shards",
                self.shard_count,
                self.shards.len()
            )));
        }
        if !self.shard_count.is_power_of_two() {
            return Err(CacheError::CorruptSnapshot(format!(
                "shard count {} is not a power of two",
                self.shard_count
            )));
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let snapshot: Snapshot = bincode::deserialize(bytes)?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

/// Sibling temporary path for a dump in progress.
pub fn temp_path(path: &Path) -> PathBuf {
    let suffix = chrono::Local::now().format("%Y%m%d%H%M%S");
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}", suffix));
    PathBuf::from(name)
}

/// Writes `snapshot` to `path` atomically.
///
/// The old snapshot at `path` stays in place until the rename replaces it.
pub async fn write(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let bytes = snapshot.encode()?;
    let temp = temp_path(path);

    if let Err(e) = fs::write(&temp, &bytes).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }

    debug!(path = %path.display(), bytes = bytes.len(), "Snapshot written");
    Ok(())
}

/// Reads and validates the snapshot at `path`.
pub async fn read(path: &Path) -> Result<Snapshot> {
    let bytes = fs::read(path).await?;
    Snapshot::decode(&bytes)
}
