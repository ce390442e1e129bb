//! Error types for the disk blob cache
//!
//! These never reach callers of [`crate::DiskCache`]; the cache handles them
//! locally and degrades to a miss. They are public so the codec and store can
//! be used and tested on their own.

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum CacheError {
    /// Key unknown to the index, or its backing file is missing
    NotFound,
    /// Header magic did not match the current format
    CorruptHeader { found: i32 },
    /// Stream ended before a declared field was fully read
    TruncatedStream,
    /// A string length prefix was negative
    InvalidLength(i64),
    /// A string field was not valid UTF-8
    InvalidUtf8,
    /// The file on disk belongs to a different key
    KeyMismatch { expected: String, found: String },
    /// Payload on disk does not match the indexed size
    ShortRead { expected: u64, actual: u64 },
    Io(Box<io::Error>),
}

impl CacheError {
    /// True for errors that mean the backing file cannot be trusted and
    /// should be deleted.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            CacheError::CorruptHeader { .. }
                | CacheError::TruncatedStream
                | CacheError::InvalidLength(_)
                | CacheError::InvalidUtf8
                | CacheError::KeyMismatch { .. }
                | CacheError::ShortRead { .. }
        )
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::NotFound => write!(f, "Cache entry not found"),
            CacheError::CorruptHeader { found } => {
                write!(f, "Corrupt header: unexpected magic {:#010x}", found)
            }
            CacheError::TruncatedStream => write!(f, "Truncated stream"),
            CacheError::InvalidLength(len) => write!(f, "Invalid length prefix: {}", len),
            CacheError::InvalidUtf8 => write!(f, "Invalid UTF-8 in header string"),
            CacheError::KeyMismatch { expected, found } => {
                write!(f, "Key mismatch: expected {}, found {}", expected, found)
            }
            CacheError::ShortRead { expected, actual } => write!(
                f,
                "Short read: expected {} payload bytes, found {}",
                expected, actual
            ),
            CacheError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for CacheError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => CacheError::TruncatedStream,
            _ => CacheError::Io(Box::new(err)),
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
