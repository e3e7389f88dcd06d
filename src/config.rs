//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which front end the process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerType {
    /// Binary length-prefixed protocol
    Tcp,
    /// HTTP veneer
    Http,
}

impl FromStr for ServerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(ServerType::Tcp),
            "http" => Ok(ServerType::Http),
            other => Err(format!("unknown server type: {}", other)),
        }
    }
}

/// Cache engine parameters.
///
/// Persisted alongside the data in every snapshot, and adopted again on restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Number of shards; must be a power of two
    pub shard_count: usize,
    /// Memory quota for all keys and values, in megabytes
    pub max_memory_mb: u64,
    /// Initial map capacity of each shard
    pub shard_map_size: usize,
    /// Interval between GC sweeps in seconds
    pub gc_interval_secs: u64,
    /// Maximum expired entries removed per shard per sweep
    pub max_gc_count: usize,
    /// Interval between snapshots in seconds
    pub dump_interval_secs: u64,
    /// Snapshot file path
    pub dump_file: PathBuf,
    /// Sleep between checks of the snapshot-in-progress flag, in microseconds
    pub spin_sleep_micros: u64,
}

impl CacheOptions {
    /// Byte quota of a single shard.
    pub fn shard_quota(&self) -> u64 {
        if self.shard_count == 0 {
            return 0;
        }
        self.max_memory_mb * 1024 * 1024 / self.shard_count as u64
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            shard_count: 256,
            max_memory_mb: 1024,
            shard_map_size: 256,
            gc_interval_secs: 600,
            max_gc_count: 1000,
            dump_interval_secs: 1800,
            dump_file: PathBuf::from("cache-server.dump"),
            spin_sleep_micros: 20,
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Front end to serve
    pub server_type: ServerType,
    /// Listen address
    pub server_address: String,
    /// Engine parameters
    pub cache: CacheOptions,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_TYPE` - `tcp` or `http` (default: tcp)
    /// - `SERVER_ADDRESS` - Listen address (default: 0.0.0.0:5837)
    /// - `SHARD_COUNT` - Number of shards, power of two (default: 256)
    /// - `MAX_MEMORY_MB` - Memory quota in megabytes (default: 1024)
    /// - `SHARD_MAP_SIZE` - Initial map capacity per shard (default: 256)
    /// - `GC_INTERVAL` - GC frequency in seconds, at least 1 (default: 600)
    /// - `MAX_GC_COUNT` - Max removals per shard per sweep, at least 1 (default: 1000)
    /// - `DUMP_INTERVAL` - Snapshot frequency in seconds, at least 1 (default: 1800)
    /// - `DUMP_FILE` - Snapshot path (default: cache-server.dump)
    /// - `SPIN_SLEEP_MICROS` - Snapshot wait poll interval (default: 20)
    pub fn from_env() -> Self {
        let defaults = CacheOptions::default();
        Self {
            server_type: env_or("SERVER_TYPE", ServerType::Tcp),
            server_address: env::var("SERVER_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:5837".to_string()),
            cache: CacheOptions {
                shard_count: env_or("SHARD_COUNT", defaults.shard_count),
                max_memory_mb: env_or("MAX_MEMORY_MB", defaults.max_memory_mb),
                shard_map_size: env_or("SHARD_MAP_SIZE", defaults.shard_map_size),
                gc_interval_secs: env_or("GC_INTERVAL", defaults.gc_interval_secs),
                max_gc_count: env_or("MAX_GC_COUNT", defaults.max_gc_count),
                dump_interval_secs: env_or("DUMP_INTERVAL", defaults.dump_interval_secs),
                dump_file: env::var("DUMP_FILE")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.dump_file),
                spin_sleep_micros: env_or("SPIN_SLEEP_MICROS", defaults.spin_sleep_micros),
            },
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_type: ServerType::Tcp,
            server_address: "0.0.0.0:5837".to_string(),
            cache: CacheOptions::default(),
        }
    }
}
