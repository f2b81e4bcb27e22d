//! SQLite-backed cache that survives process restarts.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tracing::warn;

use super::{CacheBackend, CacheEntry};

/// Cache storage errors.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("Cache connection lock poisoned")]
    LockPoisoned,
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Cache table schema.
pub const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS response_cache (
    cache_key TEXT PRIMARY KEY,
    value TEXT NOT NULL,                          -- JSON document
    cached_at TEXT NOT NULL,                      -- RFC 3339
    expires_at TEXT NOT NULL                      -- RFC 3339
);

CREATE INDEX IF NOT EXISTS idx_response_cache_expires ON response_cache(expires_at);
"#;

/// Cache backend persisted in a SQLite database.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Open the cache at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> CacheResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Create an in-memory cache (for testing).
    pub fn open_in_memory() -> CacheResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> CacheResult<Self> {
        conn.execute_batch(CACHE_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> CacheResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::LockPoisoned)
    }

    fn load(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        let row = self
            .conn()?
            .query_row(
                r#"
                SELECT value, cached_at, expires_at
                FROM response_cache
                WHERE cache_key = ?
                "#,
                [key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((value, cached_at, expires_at)) = row else {
            return Ok(None);
        };

        Ok(Some(CacheEntry {
            key: key.to_string(),
            value: serde_json::from_str(&value)?,
            cached_at: parse_timestamp(&cached_at)?,
            expires_at: parse_timestamp(&expires_at)?,
        }))
    }

    fn store(&self, entry: &CacheEntry) -> CacheResult<()> {
        let value = serde_json::to_string(&entry.value)?;
        self.conn()?.execute(
            r#"
            INSERT INTO response_cache (cache_key, value, cached_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(cache_key) DO UPDATE SET
                value = excluded.value,
                cached_at = excluded.cached_at,
                expires_at = excluded.expires_at
            "#,
            params![
                entry.key,
                value,
                format_timestamp(entry.cached_at),
                format_timestamp(entry.expires_at),
            ],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<()> {
        self.conn()?
            .execute("DELETE FROM response_cache WHERE cache_key = ?", [key])?;
        Ok(())
    }

    fn delete_expired(&self) -> CacheResult<usize> {
        // Fixed-width UTC timestamps sort chronologically.
        let now = format_timestamp(Utc::now());
        let removed = self
            .conn()?
            .execute("DELETE FROM response_cache WHERE expires_at <= ?", [now])?;
        Ok(removed)
    }

    fn count(&self) -> CacheResult<usize> {
        let count: i64 =
            self.conn()?
                .query_row("SELECT COUNT(*) FROM response_cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> CacheResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

impl CacheBackend for SqliteCache {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.load(key).unwrap_or_else(|e| {
            warn!(key = %key, error = %e, "cache read failed");
            None
        })
    }

    fn put(&self, entry: CacheEntry) {
        if let Err(e) = self.store(&entry) {
            warn!(key = %entry.key, error = %e, "cache write failed");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.delete(key) {
            warn!(key = %key, error = %e, "cache delete failed");
        }
    }

    fn purge_expired(&self) -> usize {
        self.delete_expired().unwrap_or_else(|e| {
            warn!(error = %e, "cache purge failed");
            0
        })
    }

    fn len(&self) -> usize {
        self.count().unwrap_or_else(|e| {
            warn!(error = %e, "cache count failed");
            0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_schema_initialized() {
        let cache = SqliteCache::open_in_memory().unwrap();
        let tables: Vec<String> = cache
            .conn()
            .unwrap()
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"response_cache".to_string()));
    }

    #[test]
    fn test_upsert_and_get() {
        let cache = SqliteCache::open_in_memory().unwrap();
        cache.put(CacheEntry::new("k", json!({"dosage": "500mg"}), Duration::hours(24)));
        cache.put(CacheEntry::new("k", json!({"dosage": "1g"}), Duration::hours(24)));

        let entry = cache.get("k").unwrap();
        assert_eq!(entry.value, json!({"dosage": "1g"}));
        assert_eq!(cache.len(), 1);

        cache.remove("k");
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_purge_expired() {
        let cache = SqliteCache::open_in_memory().unwrap();
        cache.put(CacheEntry::new("old", json!(1), Duration::seconds(-5)));
        cache.put(CacheEntry::new("new", json!(2), Duration::hours(1)));

        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.get("old").is_none());
        assert!(cache.get("new").is_some());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        {
            let cache = SqliteCache::open(&path).unwrap();
            cache.put(CacheEntry::new("k", json!("kept"), Duration::hours(1)));
        }

        let cache = SqliteCache::open(&path).unwrap();
        assert_eq!(cache.get("k").unwrap().value, json!("kept"));
    }
}
