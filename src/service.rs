//! Content service: memoized lookups in front of the query engine, plus the
//! request counters the load tests read back.

use crate::cache::ContentCache;
use crate::engine::QueryEngine;
use crate::error::Result;
use crate::model::{Content, WorkUnit};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Name of the cache holding content.
pub const CONTENT_CACHE: &str = "content";

/// Counters over successfully served requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestStats {
    pub count: u64,
    pub total_duration: Duration,
}

impl RequestStats {
    /// Mean latency, `None` before the first request.
    pub fn average(&self) -> Option<Duration> {
        if self.count == 0 {
            return None;
        }
        let nanos = self.total_duration.as_nanos() / u128::from(self.count);
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }
}

pub struct ContentService {
    engine: QueryEngine,
    cache: ContentCache,
    requests: AtomicU64,
    duration_nanos: AtomicU64,
}

impl ContentService {
    pub fn new(engine: QueryEngine) -> Self {
        Self {
            engine,
            cache: ContentCache::new(CONTENT_CACHE),
            requests: AtomicU64::new(0),
            duration_nanos: AtomicU64::new(0),
        }
    }

    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Look up content by id, querying the backend on a miss.
    ///
    /// `size` and `duration_ms` only matter on a miss; a hit returns whatever
    /// was stored for `id`.
    pub async fn find_content(&self, id: i64, size: i32, duration_ms: i64) -> Result<Content> {
        debug!(id, "find_content started");
        let started = Instant::now();
        let work = WorkUnit::new(id, size, duration_ms);

        let content = self
            .cache
            .get_or_compute(id, || async move {
                info!(id, size, duration_ms, "cache miss");
                self.engine.query(work).await
            })
            .await?;

        let elapsed = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.duration_nanos.fetch_add(elapsed, Ordering::Relaxed);
        let total = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(id, total, "find_content finished");

        Ok(content)
    }

    /// Evict `id` so the next lookup reaches the backend.
    pub async fn evict(&self, id: i64) -> bool {
        info!(id, "cache evict");
        self.cache.evict(id).await
    }

    /// Zero the request counters.
    pub fn reset(&self) {
        info!("reset request/duration counters");
        self.requests.store(0, Ordering::Relaxed);
        self.duration_nanos.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> RequestStats {
        RequestStats {
            count: self.requests.load(Ordering::Relaxed),
            total_duration: Duration::from_nanos(self.duration_nanos.load(Ordering::Relaxed)),
        }
    }

    /// Names of the caches this service uses.
    pub fn cache_names(&self) -> Vec<String> {
        vec![self.cache.name().to_string()]
    }
}
