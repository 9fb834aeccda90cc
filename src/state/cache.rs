//! TTL cache in front of aggregate and listing reads.
//!
//! Entries expire lazily: an expired entry is dropped by the read that finds it, there
//! is no background sweeper. Every mutation of quiz content flushes the whole cache.

use std::{
    any::Any,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tracing::debug;

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    expires_at: Instant,
}

/// Concurrent key/value cache with per-entry time-to-live.
#[derive(Default)]
pub struct CacheOverlay {
    entries: DashMap<String, CacheEntry>,
    generation: AtomicU64,
}

impl CacheOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key` when present, unexpired and of type `T`.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if entry.expires_at > now {
                return entry.value.downcast_ref::<T>().cloned();
            }
        }
        self.entries
            .remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    /// Store `value` under `key` for `ttl`.
    pub fn insert<T>(&self, key: impl Into<String>, value: T, ttl: Duration)
    where
        T: Send + Sync + 'static,
    {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value: Arc::new(value),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    ///
    /// Errors from `compute` are returned as-is and never cached. A value computed while a
    /// [`flush`](Self::flush) happened is returned to the caller but not stored.
    pub async fn get_or_try_insert_with<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get::<T>(key) {
            return Ok(hit);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let value = compute().await?;
        if self.generation.load(Ordering::Acquire) == generation {
            self.insert(key, value.clone(), ttl);
        } else {
            debug!(key, "cache flushed during recompute; result not stored");
        }
        Ok(value)
    }

    /// Discard every entry.
    pub fn flush(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let dropped = self.entries.len();
        self.entries.clear();
        debug!(dropped, "cache flushed");
    }

    /// Number of entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
