//! Cache types

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Default maximum disk usage in bytes (5 MiB)
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 5 * 1024 * 1024;

/// Pruning stops once usage drops below this fraction of the budget
pub const HYSTERESIS_FACTOR: f64 = 0.9;

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Data and metadata for an entry handed to or returned by the cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub data: Vec<u8>,
    /// Epoch milliseconds after which the caller should treat the data as stale
    pub expire_time: i64,
    /// Encoding hint supplied by the caller, may be empty
    pub charset: String,
}

impl Entry {
    pub fn new(data: Vec<u8>, charset: impl Into<String>) -> Self {
        Self {
            data,
            expire_time: 0,
            charset: charset.into(),
        }
    }

    pub fn with_expire_time(mut self, expire_time: i64) -> Self {
        self.expire_time = expire_time;
        self
    }

    pub fn is_expired(&self) -> bool {
        self.expire_time < now_millis()
    }

    /// True if the caller should refetch from the original source.
    /// Uses the expiry time until a separate refresh time exists.
    pub fn refresh_needed(&self) -> bool {
        self.is_expired()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Set a new expiry on the entry if there is one.
    pub fn invalidate(entry: Option<&mut Entry>, expire_time: i64) -> bool {
        match entry {
            Some(entry) => {
                entry.expire_time = expire_time;
                true
            }
            None => false,
        }
    }
}

/// Metadata persisted at the front of every entry file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHeader {
    pub key: String,
    /// Payload length; derived from the file, never serialized
    pub size_bytes: u64,
    pub expire_time: i64,
    pub charset: String,
}

impl CacheHeader {
    pub fn from_entry(key: &str, entry: &Entry) -> Self {
        Self {
            key: key.to_string(),
            size_bytes: entry.data.len() as u64,
            expire_time: entry.expire_time,
            charset: entry.charset.clone(),
        }
    }

    pub fn to_entry(&self, data: Vec<u8>) -> Entry {
        Entry {
            data,
            expire_time: self.expire_time,
            charset: self.charset.clone(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expire_time < now_millis()
    }
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size: u64,
    pub max_size: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Where the cache lives and how large it may grow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskCacheConfig {
    pub root_dir: PathBuf,
    pub max_size_bytes: u64,
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./cache/http"),
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
        }
    }
}

impl DiskCacheConfig {
    /// Parse configuration from `CACHE_DIR` and `MAX_CACHE_SIZE`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let root_dir = env::var("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.root_dir);

        let max_size_bytes = env::var("MAX_CACHE_SIZE")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.max_size_bytes);

        Self {
            root_dir,
            max_size_bytes,
        }
    }
}
