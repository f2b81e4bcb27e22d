//! Response cache keyed by semantic signature.
//!
//! Backends store JSON values with an expiry. Expiry is lazy: an expired entry
//! reads as a miss and is overwritten by the next write for its key.

mod memory;
mod sqlite;

pub use memory::*;
pub use sqlite::*;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Default time-to-live for cached answers.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// A cached value with its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub value: serde_json::Value,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry cached now, expiring after `ttl`.
    pub fn new(key: impl Into<String>, value: serde_json::Value, ttl: Duration) -> Self {
        let cached_at = Utc::now();
        Self {
            key: key.into(),
            value,
            cached_at,
            expires_at: cached_at + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Key-value storage for cache entries.
///
/// Implementations must tolerate concurrent `get`/`put` on the same key; the
/// last write wins. Storage failures are logged, never returned.
pub trait CacheBackend: Send + Sync {
    /// Backend name (for logging).
    fn name(&self) -> &str;

    /// Fetch an entry, expired or not.
    fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Insert or overwrite an entry.
    fn put(&self, entry: CacheEntry);

    /// Drop an entry.
    fn remove(&self, key: &str);

    /// Delete every expired entry. Returns how many were removed.
    fn purge_expired(&self) -> usize;

    /// Number of stored entries, expired ones included.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Typed, TTL-aware view over a [`CacheBackend`].
#[derive(Clone)]
pub struct ResponseCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// In-memory cache with the default TTL.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()), Duration::hours(DEFAULT_TTL_HOURS))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    /// Read a live value. Expired or undecodable entries are misses.
    ///
    /// Backend I/O runs on the blocking pool so a slow disk never stalls the
    /// async worker.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let backend = Arc::clone(&self.backend);
        let owned_key = key.to_string();
        let entry = match tokio::task::spawn_blocking(move || backend.get(&owned_key)).await {
            Ok(entry) => entry?,
            Err(e) => {
                warn!(key = %key, error = %e, "cache read task failed");
                return None;
            }
        };

        if entry.is_expired() {
            debug!(key = %key, "cache entry expired");
            return None;
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    /// Store a value with the cache's TTL.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T) {
        self.put_with_ttl(key, value, self.ttl).await;
    }

    /// Store a value with an explicit TTL. Returns once the write has landed.
    pub async fn put_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let entry = match serde_json::to_value(value) {
            Ok(json) => CacheEntry::new(key, json, ttl),
            Err(e) => {
                warn!(key = %key, error = %e, "value not cacheable");
                return;
            }
        };

        let backend = Arc::clone(&self.backend);
        if let Err(e) = tokio::task::spawn_blocking(move || backend.put(entry)).await {
            warn!(key = %key, error = %e, "cache write task failed");
        }
    }
}

/// Namespaced SHA-256 key over the given key material.
pub fn cache_key(namespace: &str, material: &str) -> String {
    let digest = Sha256::digest(material.as_bytes());
    format!("{}:{}", namespace, hex::encode(digest))
}
