//! disk-cache - inspect and maintain a disk blob cache directory
//!
//! Opens the cache at `--dir` (or `CACHE_DIR`), rebuilds its index from the
//! files on disk and runs a single operation against it.

mod commands;
mod config;
mod error;

use crate::config::Args;
use crate::error::Result;
use clap::Parser;
use disk_blob_cache::DiskCache;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Initialize logging on stderr; stdout carries command output
    let env_filter = EnvFilter::from_default_env()
        .add_directive("disk_cache=info".parse()?)
        .add_directive("disk_blob_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    };

    let args = Args::parse();
    let config = args.cache_config();
    info!(
        root = ?config.root_dir,
        max_size = config.max_size_bytes,
        "Opening cache"
    );

    let cache = DiskCache::from_config(config);
    cache.initialize();

    let stdout = std::io::stdout();
    commands::run(&cache, args.command, &mut stdout.lock())
}
