//! Command-line arguments and cache configuration

use clap::{Parser, Subcommand};
use disk_blob_cache::DiskCacheConfig;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "disk-cache", about = "Inspect and maintain a disk blob cache directory")]
pub struct Args {
    /// Cache root directory (default: $CACHE_DIR or ./cache/http)
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    /// Byte budget (default: $MAX_CACHE_SIZE or 5 MiB)
    #[arg(long, global = true)]
    pub max_size: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print cache statistics as JSON
    Stats,
    /// List keys from least to most recently used
    Keys,
    /// Print an entry's metadata, optionally writing its payload to a file
    Get {
        key: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Store a file's contents under a key
    Put {
        key: String,
        file: PathBuf,
        #[arg(long, default_value_t = 3600)]
        ttl_secs: i64,
        #[arg(long, default_value = "")]
        charset: String,
    },
    /// Set a new expiry on an entry without touching its data
    Invalidate {
        key: String,
        /// Epoch milliseconds (default: now)
        #[arg(long)]
        expire_at: Option<i64>,
    },
    /// Remove one entry
    Remove { key: String },
    /// Delete every entry
    Clear,
}

impl Args {
    /// Command-line flags override the environment
    pub fn cache_config(&self) -> DiskCacheConfig {
        let env = DiskCacheConfig::from_env();
        DiskCacheConfig {
            root_dir: self.dir.clone().unwrap_or(env.root_dir),
            max_size_bytes: self.max_size.unwrap_or(env.max_size_bytes),
        }
    }
}
