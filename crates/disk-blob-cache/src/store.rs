//! One file per entry under a flat root directory

use crate::error::{CacheError, Result};
use crate::filename::{filename_for_key, path_for_key};
use crate::header::{decode_header, encode_header, encoded_len};
use crate::types::CacheHeader;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reads and writes `[header][payload]` entry files
#[derive(Debug, Clone)]
pub struct EntryStore {
    root: PathBuf,
}

impl EntryStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for_key(&self, key: &str) -> PathBuf {
        path_for_key(&self.root, key)
    }

    /// Read the entry file for `key`.
    ///
    /// The returned header's `size_bytes` is the payload length actually read.
    /// `expected_size` is the payload length the index recorded; any other
    /// length on disk means the file was truncated or replaced.
    pub fn read_file(&self, key: &str, expected_size: u64) -> Result<(CacheHeader, Vec<u8>)> {
        let path = self.path_for_key(key);
        let file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CacheError::NotFound,
            _ => CacheError::from(e),
        })?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut header = decode_header(&mut reader)?;
        if header.key != key {
            return Err(CacheError::KeyMismatch {
                expected: key.to_string(),
                found: header.key,
            });
        }

        let payload_len = file_len.saturating_sub(encoded_len(&header));
        if payload_len != expected_size {
            return Err(CacheError::ShortRead {
                expected: expected_size,
                actual: payload_len,
            });
        }

        let mut payload = Vec::with_capacity(payload_len as usize);
        reader.take(payload_len).read_to_end(&mut payload)?;
        if payload.len() as u64 != payload_len {
            return Err(CacheError::ShortRead {
                expected: payload_len,
                actual: payload.len() as u64,
            });
        }

        header.size_bytes = payload_len;
        Ok((header, payload))
    }

    /// Write header then payload to the entry file for `header.key`.
    /// A partially written file is removed before the error is returned.
    pub fn write_file(&self, header: &CacheHeader, payload: &[u8]) -> Result<()> {
        let path = self.path_for_key(&header.key);
        let result = Self::write_to(&path, header, payload);
        if let Err(e) = &result {
            warn!(key = %header.key, path = ?path, error = %e, "Failed to write cache file");
            if let Err(rm) = fs::remove_file(&path) {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    debug!(path = ?path, error = %rm, "Could not clean up partial cache file");
                }
            }
        }
        result
    }

    fn write_to(path: &Path, header: &CacheHeader, payload: &[u8]) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        encode_header(header, &mut writer)?;
        writer.write_all(payload)?;
        writer.flush()?;
        Ok(())
    }

    /// Remove the entry file for `key`. Returns false if it could not be
    /// removed; a file that was already gone counts as removed.
    pub fn delete_file(&self, key: &str) -> bool {
        delete_path(&self.path_for_key(key))
    }

    /// Decode every file under the root, deleting unreadable and expired ones.
    ///
    /// Yields `(filename, header)` in directory order, with `size_bytes` set to
    /// the payload length.
    pub fn scan_all(&self) -> Result<Vec<(String, CacheHeader)>> {
        let mut found = Vec::new();

        for dir_entry in fs::read_dir(&self.root)? {
            let dir_entry = match dir_entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(root = ?self.root, error = %e, "Failed to read cache directory entry");
                    continue;
                }
            };
            let path = dir_entry.path();
            if !path.is_file() {
                continue;
            }
            let filename = dir_entry.file_name().to_string_lossy().into_owned();

            let mut header = match Self::read_header(&path) {
                Ok(header) => header,
                Err(e) => {
                    warn!(path = ?path, error = %e, "Deleting unreadable cache file");
                    delete_path(&path);
                    continue;
                }
            };

            if header.is_expired() {
                debug!(key = %header.key, path = ?path, "Deleting expired cache file");
                delete_path(&path);
                continue;
            }

            if filename != filename_for_key(&header.key) {
                warn!(key = %header.key, path = ?path, "Deleting misnamed cache file");
                delete_path(&path);
                continue;
            }

            let file_len = match dir_entry.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => {
                    warn!(path = ?path, error = %e, "Failed to stat cache file");
                    continue;
                }
            };
            header.size_bytes = file_len.saturating_sub(encoded_len(&header));
            found.push((filename, header));
        }

        Ok(found)
    }

    fn read_header(path: &Path) -> Result<CacheHeader> {
        let mut reader = BufReader::new(File::open(path)?);
        decode_header(&mut reader)
    }

    /// Delete every regular file directly under the root. Returns the number
    /// of files removed.
    pub fn delete_all(&self) -> usize {
        let dir = match fs::read_dir(&self.root) {
            Ok(dir) => dir,
            Err(e) => {
                debug!(root = ?self.root, error = %e, "Nothing to clear");
                return 0;
            }
        };

        dir.filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| delete_path(path))
            .count()
    }
}

fn delete_path(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(path = ?path, error = %e, "Could not delete cache file");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::now_millis;
    use tempfile::tempdir;

    fn header(key: &str, payload: &[u8], expire_time: i64) -> CacheHeader {
        CacheHeader {
            key: key.to_string(),
            size_bytes: payload.len() as u64,
            expire_time,
            charset: "utf-8".to_string(),
        }
    }

    fn future() -> i64 {
        now_millis() + 3_600_000
    }

    #[test]
    fn test_write_and_read_file() {
        let dir = tempdir().unwrap();
        let store = EntryStore::new(dir.path().to_path_buf());
        let h = header("http://example.com/", b"<html></html>", future());

        store.write_file(&h, b"<html></html>").unwrap();
        let (read, payload) = store.read_file("http://example.com/", 13).unwrap();
        assert_eq!(read, h);
        assert_eq!(payload, b"<html></html>");
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let store = EntryStore::new(dir.path().to_path_buf());
        let err = store.read_file("nope", 0).unwrap_err();
        assert!(matches!(err, CacheError::NotFound));
    }

    #[test]
    fn test_read_truncated_payload() {
        let dir = tempdir().unwrap();
        let store = EntryStore::new(dir.path().to_path_buf());
        let h = header("key", b"0123456789", future());
        store.write_file(&h, b"0123456789").unwrap();

        let path = store.path_for_key("key");
        let len = fs::metadata(&path).unwrap().len();
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(len - 4)
            .unwrap();

        let err = store.read_file("key", 10).unwrap_err();
        assert!(matches!(
            err,
            CacheError::ShortRead {
                expected: 10,
                actual: 6
            }
        ));
    }

    #[test]
    fn test_read_detects_colliding_key() {
        let dir = tempdir().unwrap();
        let store = EntryStore::new(dir.path().to_path_buf());
        let h = header("real", b"x", future());
        store.write_file(&h, b"x").unwrap();

        // Simulate another key that maps to the same file
        fs::rename(store.path_for_key("real"), store.path_for_key("other")).unwrap();

        let err = store.read_file("other", 1).unwrap_err();
        assert!(matches!(err, CacheError::KeyMismatch { .. }));
    }

    #[test]
    fn test_write_failure_reports_error() {
        let dir = tempdir().unwrap();
        let store = EntryStore::new(dir.path().join("missing-subdir"));
        let h = header("key", b"data", future());
        let err = store.write_file(&h, b"data").unwrap_err();
        assert!(matches!(err, CacheError::Io(_)));
        assert!(!store.path_for_key("key").exists());
    }

    #[test]
    fn test_delete_file() {
        let dir = tempdir().unwrap();
        let store = EntryStore::new(dir.path().to_path_buf());
        store.write_file(&header("key", b"a", future()), b"a").unwrap();

        assert!(store.delete_file("key"));
        assert!(!store.path_for_key("key").exists());
        // Already gone
        assert!(store.delete_file("key"));
    }

    #[test]
    fn test_scan_all_self_heals() {
        let dir = tempdir().unwrap();
        let store = EntryStore::new(dir.path().to_path_buf());

        store
            .write_file(&header("live", b"abc", future()), b"abc")
            .unwrap();
        store
            .write_file(&header("stale", b"abc", now_millis() - 1000), b"abc")
            .unwrap();
        fs::write(dir.path().join("garbage"), b"not a cache file").unwrap();
        fs::write(dir.path().join("short"), [0x04, 0x05]).unwrap();

        let found = store.scan_all().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, filename_for_key("live"));
        assert_eq!(found[0].1.key, "live");
        assert_eq!(found[0].1.size_bytes, 3);

        assert!(!store.path_for_key("stale").exists());
        assert!(!dir.path().join("garbage").exists());
        assert!(!dir.path().join("short").exists());
    }

    #[test]
    fn test_scan_all_deletes_misnamed_file() {
        let dir = tempdir().unwrap();
        let store = EntryStore::new(dir.path().to_path_buf());
        store.write_file(&header("key", b"a", future()), b"a").unwrap();
        fs::rename(store.path_for_key("key"), dir.path().join("renamed")).unwrap();

        assert!(store.scan_all().unwrap().is_empty());
        assert!(!dir.path().join("renamed").exists());
    }

    #[test]
    fn test_scan_all_skips_directories() {
        let dir = tempdir().unwrap();
        let store = EntryStore::new(dir.path().to_path_buf());
        fs::create_dir(dir.path().join("nested")).unwrap();

        assert!(store.scan_all().unwrap().is_empty());
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_delete_all() {
        let dir = tempdir().unwrap();
        let store = EntryStore::new(dir.path().to_path_buf());
        store.write_file(&header("a", b"1", future()), b"1").unwrap();
        store.write_file(&header("b", b"2", future()), b"2").unwrap();
        fs::write(dir.path().join("stray"), b"junk").unwrap();

        assert_eq!(store.delete_all(), 3);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
