//! Cache Engine Module
//!
//! Routes every key to one of a fixed, power-of-two number of shards and
//! coordinates sweeping and snapshot persistence across them.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::cache::snapshot::{self, Snapshot};
use crate::cache::{Shard, Status};
use crate::config::CacheOptions;
use crate::error::{CacheError, Result};

// == Routing ==
/// Hashes a key for shard selection.
///
/// Polynomial `31 * h + byte` fold, then the high bits are mixed into the low
/// bits. Stable across processes.
pub fn hash_key(key: &str) -> i64 {
    let h = key
        .bytes()
        .fold(0i64, |h, b| h.wrapping_mul(31).wrapping_add(i64::from(b)));
    h ^ (h >> 16)
}

// == Snapshot Gate ==
/// Process-wide pause used while a snapshot is being written.
///
/// Callers poll the flag and sleep between checks rather than block on it.
#[derive(Debug)]
pub struct SnapshotGate {
    dumping: AtomicBool,
    spin_sleep: Duration,
}

/// Clears the gate when dropped, so every exit path of a dump reopens it.
#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a SnapshotGate,
}

impl SnapshotGate {
    pub fn new(spin_sleep: Duration) -> Self {
        Self {
            dumping: AtomicBool::new(false),
            spin_sleep,
        }
    }

    /// Returns true while a snapshot is in progress.
    pub fn is_closed(&self) -> bool {
        self.dumping.load(Ordering::Acquire)
    }

    /// Waits until no snapshot is in progress.
    pub async fn wait(&self) {
        while self.is_closed() {
            tokio::time::sleep(self.spin_sleep).await;
        }
    }

    /// Closes the gate until the returned guard is dropped.
    pub fn close(&self) -> GateGuard<'_> {
        self.dumping.store(true, Ordering::Release);
        GateGuard { gate: self }
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.dumping.store(false, Ordering::Release);
    }
}

// == Cache Engine ==
/// Sharded cache with sliding TTL, quota enforcement and snapshots.
#[derive(Debug)]
pub struct CacheEngine {
    shards: Vec<Shard>,
    mask: usize,
    options: CacheOptions,
    gate: SnapshotGate,
}

impl CacheEngine {
    // == Constructor ==
    /// Creates an empty engine.
    ///
    /// Rejects shard counts that are zero or not a power of two, since
    /// routing masks the hash instead of taking a modulo. Zero GC or dump
    /// intervals and a zero GC batch are rejected as well.
    pub fn new(options: CacheOptions) -> Result<Self> {
        validate_options(&options)?;
        let quota = options.shard_quota();
        let shards = (0..options.shard_count)
            .map(|_| Shard::new(quota, options.shard_map_size))
            .collect();
        Ok(Self::assemble(shards, options))
    }

    fn assemble(shards: Vec<Shard>, options: CacheOptions) -> Self {
        Self {
            mask: options.shard_count - 1,
            gate: SnapshotGate::new(Duration::from_micros(options.spin_sleep_micros)),
            shards,
            options,
        }
    }

    /// Restores the engine from `options.dump_file`, or starts empty when
    /// there is no usable snapshot.
    pub async fn open(options: CacheOptions) -> Result<Self> {
        match Self::restore(&options.dump_file).await {
            Ok(engine) => {
                info!(
                    path = %options.dump_file.display(),
                    entries = engine.status().await.count,
                    "Restored cache from snapshot"
                );
                Ok(engine)
            }
            Err(CacheError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %options.dump_file.display(), "No snapshot found, starting empty");
                Self::new(options)
            }
            Err(e) => {
                warn!(
                    path = %options.dump_file.display(),
                    error = %e,
                    "Snapshot unusable, starting empty"
                );
                Self::new(options)
            }
        }
    }

    /// Rebuilds an engine from the snapshot at `path`.
    ///
    /// The configuration stored in the snapshot is adopted as-is.
    pub async fn restore(path: &Path) -> Result<Self> {
        let snapshot = snapshot::read(path).await?;
        let options = snapshot.options;
        validate_options(&options)?;
        let quota = options.shard_quota();
        let shards = snapshot
            .shards
            .into_iter()
            .map(|record| Shard::from_record(record, quota))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::assemble(shards, options))
    }

    /// Returns the engine configuration.
    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Returns the snapshot gate.
    pub fn gate(&self) -> &SnapshotGate {
        &self.gate
    }

    /// Returns the index of the shard owning `key`.
    pub fn shard_index(&self, key: &str) -> usize {
        (hash_key(key) as usize) & self.mask
    }

    fn shard_of(&self, key: &str) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    // == Get ==
    /// Retrieves a payload by key. Expired keys read as absent.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        self.gate.wait().await;
        self.shard_of(key).get(key).await
    }

    // == Set ==
    /// Stores a copy of `payload` with a TTL in seconds (0 = never expires).
    pub async fn set(&self, key: &str, payload: &[u8], ttl: u64) -> Result<()> {
        self.gate.wait().await;
        self.shard_of(key).set(key, payload, ttl).await
    }

    // == Delete ==
    /// Removes a key. Absent keys are ignored.
    pub async fn delete(&self, key: &str) {
        self.gate.wait().await;
        self.shard_of(key).delete(key).await
    }

    // == Status ==
    /// Sums the accounting of every shard.
    ///
    /// Shards are read one at a time, so concurrent writes may be partially
    /// reflected.
    pub async fn status(&self) -> Status {
        self.gate.wait().await;
        let mut total = Status::new();
        for shard in &self.shards {
            total.merge(&shard.status().await);
        }
        total
    }

    // == Sweep ==
    /// Sweeps expired entries from every shard concurrently.
    ///
    /// Each shard removes at most `max_gc_count` entries. Returns the total
    /// number removed.
    pub async fn sweep_all(&self) -> usize {
        self.gate.wait().await;
        let limit = self.options.max_gc_count;
        join_all(self.shards.iter().map(|shard| shard.sweep_expired(limit)))
            .await
            .into_iter()
            .sum()
    }

    // == Dump ==
    /// Writes a snapshot of the whole engine to the configured dump file.
    ///
    /// All cache operations wait until the dump has finished or failed.
    pub async fn dump(&self) -> Result<()> {
        self.dump_with_pause(Duration::ZERO).await
    }

    async fn dump_with_pause(&self, pause: Duration) -> Result<()> {
        let _guard = self.gate.close();

        let mut records = Vec::with_capacity(self.shards.len());
        for shard in &self.shards {
            records.push(shard.to_record().await);
        }
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        let snapshot = Snapshot::new(records, self.options.clone());
        snapshot::write(&self.options.dump_file, &snapshot).await
    }
}

fn validate_options(options: &CacheOptions) -> Result<()> {
    if options.shard_count == 0 || !options.shard_count.is_power_of_two() {
        return Err(CacheError::InvalidConfig(format!(
            "shard count must be a power of two, got {}",
            options.shard_count
        )));
    }
    // A zero interval would turn the background loops into busy loops
    if options.gc_interval_secs == 0 || options.dump_interval_secs == 0 {
        return Err(CacheError::InvalidConfig(
            "gc and dump intervals must be at least 1 second".to_string(),
        ));
    }
    if options.max_gc_count == 0 {
        return Err(CacheError::InvalidConfig(
            "max gc count must be at least 1".to_string(),
        ));
    }
    Ok(())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::snapshot::ShardRecord;
    use std::sync::Arc;
    use std::time::Instant;
    use tempfile::TempDir;

    fn options(dir: &TempDir) -> CacheOptions {
        CacheOptions {
            shard_count: 16,
            max_memory_mb: 16,
            dump_file: dir.path().join("cache.dump"),
            ..CacheOptions::default()
        }
    }

    async fn records(engine: &CacheEngine) -> Vec<ShardRecord> {
        let mut records = Vec::with_capacity(engine.shards.len());
        for shard in &engine.shards {
            let mut record = shard.to_record().await;
            record.entries.sort_by(|a, b| a.key.cmp(&b.key));
            records.push(record);
        }
        records
    }

    #[test]
    fn test_hash_matches_polynomial_fold() {
        // "ab" = 31 * 97 + 98 = 3105, which has no bits above 16
        assert_eq!(hash_key("ab"), 3105);
        assert_eq!(hash_key(""), 0);
    }

    #[test]
    fn test_routing_is_deterministic() {
        let engine = CacheEngine::new(CacheOptions::default()).unwrap();
        for key in ["a", "user:42", "a much longer key with spaces"] {
            let first = engine.shard_index(key);
            assert_eq!(first, engine.shard_index(key));
            assert!(first < 256);
        }
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        for count in [0, 3, 100] {
            let result = CacheEngine::new(CacheOptions {
                shard_count: count,
                ..CacheOptions::default()
            });
            assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_rejects_zero_intervals_and_gc_count() {
        let invalid = [
            CacheOptions {
                gc_interval_secs: 0,
                ..CacheOptions::default()
            },
            CacheOptions {
                dump_interval_secs: 0,
                ..CacheOptions::default()
            },
            CacheOptions {
                max_gc_count: 0,
                ..CacheOptions::default()
            },
        ];
        for options in invalid {
            assert!(matches!(
                CacheEngine::new(options),
                Err(CacheError::InvalidConfig(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let dir = TempDir::new().unwrap();
        let engine = CacheEngine::new(options(&dir)).unwrap();

        engine.set("key", b"value", 0).await.unwrap();
        assert_eq!(engine.get("key").await.unwrap().as_ref(), b"value");

        engine.delete("key").await;
        assert!(engine.get("key").await.is_none());
        assert_eq!(engine.status().await, Status::new());
    }

    #[tokio::test]
    async fn test_ttl_expiry_updates_status() {
        let dir = TempDir::new().unwrap();
        let engine = CacheEngine::new(options(&dir)).unwrap();

        engine.set("short", b"v", 1).await.unwrap();
        engine.set("long", b"v", 0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(engine.get("short").await.is_none());
        assert_eq!(engine.status().await.count, 1);
    }

    #[tokio::test]
    async fn test_sliding_expiration() {
        let dir = TempDir::new().unwrap();
        let engine = CacheEngine::new(options(&dir)).unwrap();

        engine.set("k", b"v", 2).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(engine.get("k").await.is_some());

        // 2.5s after the set, but only 1.5s after the last touch
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(engine.get("k").await.is_some());
    }

    #[tokio::test]
    async fn test_capacity_enforcement() {
        let dir = TempDir::new().unwrap();
        let engine = CacheEngine::new(CacheOptions {
            shard_count: 1,
            max_memory_mb: 1,
            ..options(&dir)
        })
        .unwrap();

        let first = vec![1u8; 600 * 1024];
        engine.set("a", &first, 0).await.unwrap();
        let result = engine.set("b", &vec![2u8; 600 * 1024], 0).await;

        assert!(matches!(result, Err(CacheError::CapacityExceeded { .. })));
        assert_eq!(engine.get("a").await.unwrap().as_ref(), first.as_slice());
        assert_eq!(engine.status().await.count, 1);
    }

    #[tokio::test]
    async fn test_sweep_all_removes_expired() {
        let dir = TempDir::new().unwrap();
        let engine = CacheEngine::new(options(&dir)).unwrap();
        for i in 0..20 {
            engine.set(&format!("key{}", i), b"v", 1).await.unwrap();
        }
        engine.set("keep", b"v", 0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(engine.sweep_all().await, 20);
        assert_eq!(engine.status().await.count, 1);
    }

    #[tokio::test]
    async fn test_sweep_batch_bound() {
        let dir = TempDir::new().unwrap();
        let engine = CacheEngine::new(CacheOptions {
            shard_count: 1,
            max_gc_count: 4,
            ..options(&dir)
        })
        .unwrap();
        for i in 0..10 {
            engine.set(&format!("key{}", i), b"v", 1).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(engine.sweep_all().await, 4);
        assert_eq!(engine.status().await.count, 6);
    }

    #[tokio::test]
    async fn test_dump_and_restore() {
        let dir = TempDir::new().unwrap();
        let engine = CacheEngine::new(options(&dir)).unwrap();
        for i in 0..50 {
            engine
                .set(&format!("key{}", i), format!("value{}", i).as_bytes(), (i % 3) * 60)
                .await
                .unwrap();
        }
        engine.dump().await.unwrap();
        assert!(!engine.gate().is_closed());

        let restored = CacheEngine::restore(&dir.path().join("cache.dump")).await.unwrap();
        assert_eq!(restored.options(), engine.options());
        assert_eq!(restored.status().await, engine.status().await);
        // Keys, payloads, TTLs and last touches all come back unchanged
        assert_eq!(records(&restored).await, records(&engine).await);
        for i in 0..50 {
            let key = format!("key{}", i);
            assert_eq!(restored.shard_index(&key), engine.shard_index(&key));
            assert_eq!(
                restored.get(&key).await.unwrap().as_ref(),
                format!("value{}", i).as_bytes()
            );
        }
    }

    #[tokio::test]
    async fn test_restored_ttl_keeps_running() {
        let dir = TempDir::new().unwrap();
        let engine = CacheEngine::new(options(&dir)).unwrap();
        engine.set("short", b"v", 1).await.unwrap();
        engine.set("forever", b"v", 0).await.unwrap();
        engine.dump().await.unwrap();

        let restored = CacheEngine::restore(&dir.path().join("cache.dump")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(restored.get("short").await.is_none());
        assert!(restored.get("forever").await.is_some());
        assert_eq!(restored.status().await.count, 1);
    }

    #[tokio::test]
    async fn test_dump_failure_reopens_gate() {
        let dir = TempDir::new().unwrap();
        let engine = CacheEngine::new(CacheOptions {
            dump_file: dir.path().join("missing-dir").join("cache.dump"),
            ..options(&dir)
        })
        .unwrap();

        assert!(engine.dump().await.is_err());
        assert!(!engine.gate().is_closed());
        engine.set("still", b"works", 0).await.unwrap();
    }

    #[tokio::test]
    async fn test_open_falls_back_to_empty() {
        let dir = TempDir::new().unwrap();
        let opts = options(&dir);

        // Missing file
        let engine = CacheEngine::open(opts.clone()).await.unwrap();
        assert_eq!(engine.status().await.count, 0);

        // Corrupt file
        std::fs::write(&opts.dump_file, b"garbage").unwrap();
        let engine = CacheEngine::open(opts).await.unwrap();
        assert_eq!(engine.status().await.count, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_operations_wait_for_dump() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(CacheEngine::new(options(&dir)).unwrap());
        engine.set("k", b"v", 0).await.unwrap();

        let dumper = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.dump_with_pause(Duration::from_millis(300)).await })
        };
        while !engine.gate().is_closed() {
            tokio::task::yield_now().await;
        }

        let started = Instant::now();
        engine.set("k2", b"v2", 0).await.unwrap();
        assert!(engine.get("k").await.is_some());
        engine.delete("k").await;
        assert!(started.elapsed() >= Duration::from_millis(200));

        dumper.await.unwrap().unwrap();

        // The snapshot was taken before the blocked writes ran
        let restored = CacheEngine::restore(&dir.path().join("cache.dump")).await.unwrap();
        assert!(restored.get("k").await.is_some());
        assert!(restored.get("k2").await.is_none());
    }
}
