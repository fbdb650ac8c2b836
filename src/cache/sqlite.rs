use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::schema::CACHE_SCHEMA;
use super::{now_unix, ResponseCache};
use crate::sqlite_persistence::open_versioned;

/// Cache persisted in a SQLite file, surviving restarts.
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCache {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path, &CACHE_SCHEMA, "cache")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Cache database lock poisoned"))
    }
}

impl ResponseCache for SqliteCache {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM cache_entries WHERE key = ?1 AND expires_at > ?2",
                params![key, now_unix()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read cache entry")?;

        raw.map(|s| serde_json::from_str(&s).context("Corrupted cache entry"))
            .transpose()
    }

    fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<()> {
        let expires_at = now_unix().saturating_add(ttl.as_secs() as i64);
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)",
                params![key, value.to_string(), expires_at],
            )
            .context("Failed to write cache entry")?;
        Ok(())
    }

    fn purge_expired(&self) -> Result<usize> {
        let removed = self
            .conn()?
            .execute(
                "DELETE FROM cache_entries WHERE expires_at <= ?1",
                params![now_unix()],
            )
            .context("Failed to purge cache entries")?;
        Ok(removed)
    }
}
