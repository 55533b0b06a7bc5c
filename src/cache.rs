//! In-process get-or-compute cache for content, keyed by content id.
//!
//! Backed by a `moka` future cache. Concurrent misses for one id share a
//! single computation, and failed computations are never stored, so the next
//! lookup tries again. There is no expiry or size bound; entries leave only
//! through [`ContentCache::evict`].

use crate::error::{Error, Result};
use crate::model::Content;
use crate::telemetry::metrics;
use moka::future::Cache;
use opentelemetry::KeyValue;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl AtomicStats {
    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
pub struct ContentCache {
    name: String,
    inner: Cache<i64, Content>,
    stats: AtomicStats,
}

impl ContentCache {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            inner: Cache::builder().name(&name).build(),
            name,
            stats: AtomicStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stored content for `id`, without computing anything.
    pub async fn get(&self, id: i64) -> Option<Content> {
        self.inner.get(&id).await
    }

    /// Whether content for `id` is stored.
    pub fn contains(&self, id: i64) -> bool {
        self.inner.contains_key(&id)
    }

    /// Return the stored content for `id`, or run `compute` and store its
    /// result.
    ///
    /// A hit never calls `compute`. Callers that arrive while another caller
    /// is computing the same id wait for that result instead, and share its
    /// error if it fails.
    pub async fn get_or_compute<F, Fut>(&self, id: i64, compute: F) -> Result<Content>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Content>>,
    {
        let mut computed = false;
        let content = self
            .inner
            .try_get_with(id, async {
                computed = true;
                compute().await
            })
            .await
            .map_err(Error::from);

        let result = if !computed && content.is_ok() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            "hit"
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            "miss"
        };
        metrics::cache_lookups().add(
            1,
            &[
                KeyValue::new("cache", self.name.clone()),
                KeyValue::new("result", result),
            ],
        );
        debug!(cache = %self.name, id, result, "cache lookup");

        content
    }

    /// Drop the entry for `id`. Returns whether one was present.
    ///
    /// A computation already in flight for `id` still completes for the
    /// callers waiting on it.
    pub async fn evict(&self, id: i64) -> bool {
        let removed = self.inner.remove(&id).await.is_some();
        if removed {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Number of ids with stored content.
    pub async fn len(&self) -> usize {
        self.inner.run_pending_tasks().await;
        usize::try_from(self.inner.entry_count()).unwrap_or(usize::MAX)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }
}
