//! Disk-backed LRU cache for response bodies
//!
//! Stores opaque byte blobs under caller-chosen keys, one file per entry,
//! each prefixed with a compact little-endian header. Total payload size is
//! kept under a byte budget by evicting least recently used entries, and the
//! in-memory index is rebuilt from the directory on startup.

mod cache;
pub mod error;
pub mod filename;
pub mod header;
pub mod index;
pub mod store;
mod types;

pub use cache::DiskCache;
pub use error::{CacheError, Result};
pub use header::CACHE_MAGIC;
pub use index::{CacheIndex, PruneOutcome};
pub use store::EntryStore;
pub use types::{
    now_millis, CacheHeader, CacheStats, DiskCacheConfig, Entry, DEFAULT_MAX_SIZE_BYTES,
    HYSTERESIS_FACTOR,
};
