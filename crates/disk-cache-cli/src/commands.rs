//! Subcommand implementations

use crate::config::Command;
use crate::error::{CliError, Result};
use chrono::{DateTime, Duration, Utc};
use disk_blob_cache::{now_millis, DiskCache, Entry};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Metadata printed by `get`
#[derive(Debug, Serialize)]
pub struct EntryInfo {
    pub key: String,
    pub size: usize,
    pub expire_time: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
    pub charset: String,
    pub file: PathBuf,
}

impl EntryInfo {
    fn new(cache: &DiskCache, key: &str, entry: &Entry) -> Self {
        Self {
            key: key.to_string(),
            size: entry.size(),
            expire_time: entry.expire_time,
            expires_at: DateTime::from_timestamp_millis(entry.expire_time),
            expired: entry.is_expired(),
            charset: entry.charset.clone(),
            file: cache.file_for_key(key),
        }
    }
}

/// Run one subcommand against an initialized cache, writing results to `out`
pub fn run<W: Write>(cache: &DiskCache, command: Command, out: &mut W) -> Result<()> {
    match command {
        Command::Stats => {
            serde_json::to_writer_pretty(&mut *out, &cache.stats())?;
            writeln!(out)?;
        }
        Command::Keys => {
            for key in cache.keys() {
                writeln!(out, "{}", key)?;
            }
        }
        Command::Get { key, out: path } => {
            let entry = cache.get(&key).ok_or_else(|| CliError::Miss(key.clone()))?;
            serde_json::to_writer_pretty(&mut *out, &EntryInfo::new(cache, &key, &entry))?;
            writeln!(out)?;
            if let Some(path) = path {
                fs::write(&path, &entry.data)?;
                info!(key = %key, path = ?path, "Wrote payload");
            }
        }
        Command::Put {
            key,
            file,
            ttl_secs,
            charset,
        } => {
            let data = fs::read(&file)?;
            let expire_at = Duration::try_seconds(ttl_secs)
                .and_then(|ttl| Utc::now().checked_add_signed(ttl))
                .ok_or_else(|| CliError::Config("ttl out of range".to_string()))?;
            let entry = Entry::new(data, charset).with_expire_time(expire_at.timestamp_millis());
            if !cache.put(&key, &entry) {
                return Err(CliError::WriteFailed(key));
            }
            info!(key = %key, size = entry.size(), expires_at = %expire_at, "Stored entry");
        }
        Command::Invalidate { key, expire_at } => {
            let expire_at = expire_at.unwrap_or_else(now_millis);
            if !cache.invalidate(&key, expire_at) {
                return Err(CliError::Miss(key));
            }
            info!(key = %key, expire_at, "Invalidated entry");
        }
        Command::Remove { key } => {
            cache.remove(&key);
            info!(key = %key, "Removed entry");
        }
        Command::Clear => cache.clear(),
    }
    Ok(())
}
