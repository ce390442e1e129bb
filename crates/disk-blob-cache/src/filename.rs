//! Key to filename mapping
//!
//! The filename is the decimal hash of the key's first half followed by the
//! decimal hash of its second half. Hashes are 32-bit polynomial hashes
//! (`h = 31 * h + unit`, wrapping) over UTF-16 code units, which keeps names
//! compatible with cache directories written by the legacy client.
//!
//! Names are pseudo-unique. Two keys can collide; the later write then
//! replaces the earlier one's file, and reads detect the key mismatch.

use std::path::{Path, PathBuf};

/// 32-bit polynomial string hash over UTF-16 code units
pub fn string_hash(units: &[u16]) -> i32 {
    units
        .iter()
        .fold(0i32, |h, &unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

/// Pseudo-unique filename for a cache key
pub fn filename_for_key(key: &str) -> String {
    let units: Vec<u16> = key.encode_utf16().collect();
    let (first, second) = units.split_at(units.len() / 2);
    format!("{}{}", string_hash(first), string_hash(second))
}

/// Path of the entry file for `key` under `root`
pub fn path_for_key(root: &Path, key: &str) -> PathBuf {
    root.join(filename_for_key(key))
}
