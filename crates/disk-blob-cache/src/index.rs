//! In-memory index of cached entries in access order

use crate::types::{CacheHeader, HYSTERESIS_FACTOR};
use hashlink::LinkedHashMap;

/// Result of a pruning pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneOutcome {
    pub evicted: usize,
    pub bytes_freed: u64,
}

/// Key to header map ordered from least to most recently used, with a
/// running total of payload bytes.
#[derive(Debug, Default)]
pub struct CacheIndex {
    entries: LinkedHashMap<String, CacheHeader>,
    total_size: u64,
}

impl CacheIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace `header.key` and make it the most recently used.
    pub fn insert_or_update(&mut self, header: CacheHeader) {
        let size = header.size_bytes;
        // `insert` moves an existing key to the back
        match self.entries.insert(header.key.clone(), header) {
            Some(old) => {
                self.total_size = self.total_size - old.size_bytes + size;
            }
            None => self.total_size += size,
        }
    }

    /// Mark `key` as most recently used. Returns false if absent.
    pub fn touch(&mut self, key: &str) -> bool {
        self.entries.to_back(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheHeader> {
        let header = self.entries.remove(key)?;
        self.total_size -= header.size_bytes;
        Some(header)
    }

    pub fn get(&self, key: &str) -> Option<&CacheHeader> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Evict least recently used entries until `incoming` more bytes fit
    /// below the hysteresis mark of `max_bytes`.
    ///
    /// Does nothing while `total + incoming < max_bytes`. `evict` is called
    /// with each victim after it leaves the index, so its file can be deleted.
    /// Stops early if the index runs empty.
    pub fn prune_if_needed<F>(&mut self, max_bytes: u64, incoming: u64, mut evict: F) -> PruneOutcome
    where
        F: FnMut(&CacheHeader),
    {
        let mut outcome = PruneOutcome::default();
        if self.total_size + incoming < max_bytes {
            return outcome;
        }

        let target = max_bytes as f64 * HYSTERESIS_FACTOR;
        while (self.total_size + incoming) as f64 >= target {
            let Some((_, victim)) = self.entries.pop_front() else {
                break;
            };
            self.total_size -= victim.size_bytes;
            outcome.evicted += 1;
            outcome.bytes_freed += victim.size_bytes;
            evict(&victim);
        }

        outcome
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_size = 0;
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys from least to most recently used
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
