//! Disk-backed LRU cache with in-memory metadata
//!
//! Every public operation takes the cache-wide lock for its full duration,
//! file I/O included, so the index never disagrees with the directory at an
//! observable point. Failures degrade to misses and are only logged.

use crate::error::CacheError;
use crate::index::CacheIndex;
use crate::store::EntryStore;
use crate::types::{CacheHeader, CacheStats, DiskCacheConfig, Entry, DEFAULT_MAX_SIZE_BYTES};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// State guarded by the cache lock
#[derive(Debug, Default)]
struct CacheState {
    index: CacheIndex,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// A byte-budgeted cache storing one file per entry under a root directory.
///
/// Construct once per directory and share it with `Arc<DiskCache>`.
#[derive(Debug)]
pub struct DiskCache {
    store: EntryStore,
    max_size: u64,
    state: Mutex<CacheState>,
}

impl DiskCache {
    /// Create a cache rooted at `root_dir`. Call [`DiskCache::initialize`]
    /// before first use.
    pub fn new(root_dir: impl Into<PathBuf>, max_size: u64) -> Self {
        Self {
            store: EntryStore::new(root_dir.into()),
            max_size,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Create a cache with the default 5 MiB budget
    pub fn with_default_size(root_dir: impl Into<PathBuf>) -> Self {
        Self::new(root_dir, DEFAULT_MAX_SIZE_BYTES)
    }

    pub fn from_config(config: DiskCacheConfig) -> Self {
        Self::new(config.root_dir, config.max_size_bytes)
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // The index is rebuilt from disk on demand, so a poisoned lock is
        // still usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load the index from the files already in the root directory, creating
    /// the directory if needed. Calling again rebuilds the index from scratch.
    pub fn initialize(&self) {
        let mut state = self.lock();
        state.index.clear();

        let root = self.store.root();
        if !root.exists() {
            if let Err(e) = fs::create_dir_all(root) {
                error!(root = ?root, error = %e, "Unable to create cache dir");
            } else {
                info!(root = ?root, "Cache directory created");
            }
            return;
        }

        let headers = match self.store.scan_all() {
            Ok(headers) => headers,
            Err(e) => {
                error!(root = ?root, error = %e, "Unable to scan cache dir");
                return;
            }
        };

        for (_, header) in headers {
            state.index.insert_or_update(header);
        }

        info!(
            root = ?root,
            entries = state.index.len(),
            total_size = state.index.total_size(),
            "Cache initialized"
        );
    }

    /// Return the entry for `key`, or `None` on a miss.
    ///
    /// Expired entries are still returned; check [`Entry::is_expired`].
    pub fn get(&self, key: &str) -> Option<Entry> {
        let mut state = self.lock();
        self.get_locked(&mut state, key)
    }

    fn get_locked(&self, state: &mut CacheState, key: &str) -> Option<Entry> {
        let Some(expected_size) = state.index.get(key).map(|h| h.size_bytes) else {
            state.misses += 1;
            debug!(key = %key, "Cache miss");
            return None;
        };

        match self.store.read_file(key, expected_size) {
            Ok((header, data)) => {
                state.index.touch(key);
                state.hits += 1;
                debug!(key = %key, size = header.size_bytes, "Cache hit");
                Some(header.to_entry(data))
            }
            Err(e) => {
                log_read_failure(key, &e);
                self.remove_locked(state, key);
                state.misses += 1;
                None
            }
        }
    }

    /// Store `entry` under `key`, evicting least recently used entries first
    /// if the budget would be exceeded. Returns false if the write failed, in
    /// which case any previous entry for `key` is gone as well.
    pub fn put(&self, key: &str, entry: &Entry) -> bool {
        let mut state = self.lock();
        self.put_locked(&mut state, key, entry)
    }

    fn put_locked(&self, state: &mut CacheState, key: &str, entry: &Entry) -> bool {
        self.prune_locked(state, entry.data.len() as u64);

        let header = CacheHeader::from_entry(key, entry);
        match self.store.write_file(&header, &entry.data) {
            Ok(()) => {
                debug!(key = %key, size = header.size_bytes, "Cached entry");
                state.index.insert_or_update(header);
                true
            }
            Err(_) => {
                // The file was truncated or removed; drop any stale index entry
                // so accounting matches the directory.
                state.index.remove(key);
                false
            }
        }
    }

    fn prune_locked(&self, state: &mut CacheState, incoming: u64) {
        let before = state.index.total_size();
        let started = Instant::now();
        let store = &self.store;

        let outcome = state.index.prune_if_needed(self.max_size, incoming, |victim| {
            if !store.delete_file(&victim.key) {
                warn!(key = %victim.key, "Could not delete evicted cache entry");
            }
        });

        if outcome.evicted > 0 {
            state.evictions += outcome.evicted as u64;
            debug!(
                pruned_files = outcome.evicted,
                bytes_freed = before - state.index.total_size(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Pruned old cache entries"
            );
        }
    }

    /// Rewrite the entry for `key` with a new expiry, keeping its data.
    /// Returns false if there was no readable entry.
    pub fn invalidate(&self, key: &str, expire_time: i64) -> bool {
        let mut state = self.lock();
        let mut entry = self.get_locked(&mut state, key);
        if !Entry::invalidate(entry.as_mut(), expire_time) {
            return false;
        }
        match entry {
            Some(entry) => self.put_locked(&mut state, key, &entry),
            None => false,
        }
    }

    /// Remove `key` from the index and delete its file. The index entry is
    /// dropped even if the delete fails.
    pub fn remove(&self, key: &str) {
        let mut state = self.lock();
        self.remove_locked(&mut state, key);
    }

    fn remove_locked(&self, state: &mut CacheState, key: &str) {
        if !self.store.delete_file(key) {
            debug!(key = %key, "Could not delete cache entry");
        }
        state.index.remove(key);
    }

    /// Delete every file under the root directory and empty the index.
    pub fn clear(&self) {
        let mut state = self.lock();
        let deleted = self.store.delete_all();
        state.index.clear();
        info!(deleted, "Cache cleared");
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().index.contains_key(key)
    }

    /// Keys from least to most recently used
    pub fn keys(&self) -> Vec<String> {
        self.lock().index.keys().map(str::to_string).collect()
    }

    pub fn total_size(&self) -> u64 {
        self.lock().index.total_size()
    }

    pub fn len(&self) -> usize {
        self.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().index.is_empty()
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn root_dir(&self) -> &Path {
        self.store.root()
    }

    /// Path of the file that holds (or would hold) `key`
    pub fn file_for_key(&self, key: &str) -> PathBuf {
        self.store.path_for_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entries: state.index.len(),
            total_size: state.index.total_size(),
            max_size: self.max_size,
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
        }
    }
}

fn log_read_failure(key: &str, err: &CacheError) {
    if err.is_corruption() {
        warn!(key = %key, error = %err, "Discarding unreadable cache entry");
    } else {
        debug!(key = %key, error = %err, "Failed to read cache entry");
    }
}
