use crate::config::AppConfig;
use ahash::RandomState;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Errors raised by cache backends.
#[derive(Debug, Error)]
pub enum CacheStoreError {
    /// Invalid configuration parameter (typically zero capacity).
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),

    /// The backend could not serve the operation.
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Key-value backend behind the cache gateway.
///
/// Implementations own their concurrency safety. A `ttl` of `None` means the entry never
/// expires, subject to any cap the backend applies.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Looks up a key. A miss is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheStoreError>;

    /// Stores a value, replacing any existing entry.
    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>)
        -> Result<(), CacheStoreError>;
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process store with per-entry expiry and bounded size.
///
/// Expired entries are dropped lazily on read and in bulk on every write. When the store is
/// full, a write evicts one arbitrary entry; there is no recency tracking.
pub struct MemoryStore {
    entries: DashMap<String, MemoryEntry, RandomState>,
    max_ttl: Option<Duration>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryStore {
    /// Creates a store. `max_ttl` caps every expiry, including "never expires".
    ///
    /// # Errors
    ///
    /// Returns [`CacheStoreError::InvalidConfig`] if `max_entries` is zero.
    pub fn new(max_ttl: Option<Duration>, max_entries: usize) -> Result<Self, CacheStoreError> {
        if max_entries == 0 {
            return Err(CacheStoreError::InvalidConfig(
                "max_entries must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            entries: DashMap::with_capacity_and_hasher(max_entries, RandomState::new()),
            max_ttl,
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Creates a store sized from the `cache` section of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CacheStoreError::InvalidConfig`] if the configured capacity is zero.
    pub fn from_config(config: &AppConfig) -> Result<Self, CacheStoreError> {
        Self::new(config.memory_max_ttl(), config.cache.memory_max_entries)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `(hits, misses)` since creation.
    #[must_use]
    pub fn hit_counts(&self) -> (u64, u64) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }

    /// Drops expired entries and frees one slot when at capacity.
    pub fn prune(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));

        if self.entries.len() >= self.max_entries {
            let victim = self.entries.iter().next().map(|entry| entry.key().clone());
            if let Some(victim) = victim {
                trace!(key = %victim, "evicting memory cache entry");
                self.entries.remove(&victim);
            }
        }
    }

    fn effective_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
        match (ttl, self.max_ttl) {
            (Some(ttl), Some(max)) => Some(ttl.min(max)),
            (None, Some(max)) => Some(max),
            (ttl, None) => ttl,
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheStoreError> {
        let now = Instant::now();
        let value = self
            .entries
            .get(key)
            .and_then(|entry| (!entry.is_expired(now)).then(|| entry.value.clone()));

        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        Ok(value)
    }

    async fn set(
        &self,
        key: &str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<(), CacheStoreError> {
        if !self.entries.contains_key(key) {
            self.prune();
        }
        let ttl = self.effective_ttl(ttl);
        debug!(key, ttl_secs = ttl.map(|d| d.as_secs()), "memory cache set");
        // Expiries past the clock's range never come due.
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        self.entries.insert(key.to_string(), MemoryEntry { value, expires_at });
        Ok(())
    }
}
