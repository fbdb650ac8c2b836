//! Expiring key/value response cache.
//!
//! Values are JSON documents stored under opaque string keys. Entries past their
//! time-to-live are never returned; they are dropped lazily or by `purge_expired`.

mod memory;
mod schema;
mod sqlite;

pub use memory::InMemoryCache;
pub use sqlite::SqliteCache;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{CacheBackend, CacheConfig};

/// Storage behind the price cache. Shared by every appraisal run, so writes for the
/// same key from concurrent runs are last-writer-wins.
pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<()>;

    /// Removes expired entries, returning how many were dropped.
    fn purge_expired(&self) -> Result<usize>;
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Opens the configured backend, `None` when caching is disabled.
pub fn open_cache(config: &CacheConfig) -> Result<Option<Arc<dyn ResponseCache>>> {
    match config.backend {
        CacheBackend::None => Ok(None),
        CacheBackend::Memory => Ok(Some(Arc::new(InMemoryCache::new()))),
        CacheBackend::Sqlite => {
            let path = config
                .db_path
                .as_ref()
                .ok_or_else(|| anyhow!("sqlite cache backend needs a db_path"))?;
            info!("Opening SQLite price cache at {:?}", path);
            let cache = SqliteCache::new(path)
                .with_context(|| format!("Failed to open cache database {:?}", path))?;
            Ok(Some(Arc::new(cache)))
        }
    }
}

/// Periodically purges expired entries until `shutdown` is cancelled.
pub async fn run_purge_task(
    cache: Arc<dyn ResponseCache>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Cache purge task shutting down");
                return;
            }
            _ = ticker.tick() => {
                match cache.purge_expired() {
                    Ok(0) => {}
                    Ok(n) => debug!("Purged {} expired cache entries", n),
                    Err(e) => warn!("Failed to purge expired cache entries: {}", e),
                }
            }
        }
    }
}
