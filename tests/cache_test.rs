//! Tests for the get-or-compute content cache.

use caching_demo::cache::ContentCache;
use caching_demo::error::{Error, Result, WorkerFault};
use caching_demo::model::{Content, WorkUnit};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

async fn produce(calls: &AtomicU32, id: i64, size: i32) -> Result<Content> {
    calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(Content::for_work(&WorkUnit::new(id, size, 100)))
}

#[tokio::test(start_paused = true)]
async fn hit_returns_stored_content_without_computing() {
    let cache = ContentCache::new("content");
    let calls = AtomicU32::new(0);

    let first = cache.get_or_compute(1, || produce(&calls, 1, 3)).await.unwrap();
    let second = cache.get_or_compute(1, || produce(&calls, 1, 99)).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first, second);
    assert_eq!(second.size, 3);

    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
    assert!((stats.hit_ratio() - 0.5).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn eviction_forces_a_miss() {
    let cache = ContentCache::new("content");
    let calls = AtomicU32::new(0);

    cache.get_or_compute(5, || produce(&calls, 5, 1)).await.unwrap();
    assert!(cache.evict(5).await);
    assert!(!cache.evict(5).await);
    assert!(cache.get(5).await.is_none());

    cache.get_or_compute(5, || produce(&calls, 5, 1)).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.stats().evictions, 1);
    assert_eq!(cache.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn eviction_of_one_id_keeps_others() {
    let cache = ContentCache::new("content");
    let calls = AtomicU32::new(0);

    cache.get_or_compute(1, || produce(&calls, 1, 1)).await.unwrap();
    cache.get_or_compute(2, || produce(&calls, 2, 1)).await.unwrap();
    cache.evict(1).await;

    assert!(cache.get(1).await.is_none());
    assert_eq!(cache.get(2).await.map(|c| c.id), Some(2));
}

#[tokio::test(start_paused = true)]
async fn concurrent_misses_compute_once() {
    let cache = ContentCache::new("content");
    let calls = AtomicU32::new(0);

    let (a, b, c) = tokio::join!(
        cache.get_or_compute(9, || produce(&calls, 9, 2)),
        cache.get_or_compute(9, || produce(&calls, 9, 2)),
        cache.get_or_compute(9, || produce(&calls, 9, 2)),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(c.unwrap().title, "Title 9");
    assert_eq!(cache.stats().misses, 1);
}

#[tokio::test]
async fn failures_are_not_cached() {
    let cache = ContentCache::new("content");
    let calls = AtomicU32::new(0);

    let failed = cache
        .get_or_compute(3, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Timeout {
                deadline: Duration::from_millis(10),
                contention: 1,
            })
        })
        .await;
    assert!(matches!(failed, Err(Error::Timeout { .. })));
    assert!(cache.is_empty().await);

    let content = cache
        .get_or_compute(3, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Content::for_work(&WorkUnit::new(3, 1, 0)))
        })
        .await
        .unwrap();

    assert_eq!(content.id, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.stats().misses, 2);
}

#[tokio::test]
async fn failed_ids_leave_no_entries_behind() {
    let cache = ContentCache::new("content");

    for id in 0..1000 {
        let failed = cache
            .get_or_compute(id, || async move {
                Err(Error::ExecutionFailure {
                    cause: WorkerFault::Cancelled,
                    contention: 1,
                })
            })
            .await;
        assert!(matches!(failed, Err(Error::ExecutionFailure { .. })));
    }

    assert_eq!(cache.len().await, 0);
    assert!((0..1000).all(|id| !cache.contains(id)));
    assert!(cache.get(999).await.is_none());
    assert_eq!(cache.stats().misses, 1000);
}

#[tokio::test(start_paused = true)]
async fn concurrent_misses_share_one_failure() {
    let cache = ContentCache::new("content");
    let counter = AtomicU32::new(0);
    let calls = &counter;
    let failing = move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        Err(Error::Timeout {
            deadline: Duration::from_millis(100),
            contention: 2,
        })
    };

    let (a, b) = tokio::join!(
        cache.get_or_compute(4, failing),
        cache.get_or_compute(4, failing),
    );

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    for result in [a, b] {
        match result {
            Err(Error::Timeout { contention, .. }) => assert_eq!(contention, 2),
            other => panic!("expected Timeout, got {other:?}"),
        }
    }
    assert!(cache.is_empty().await);
}
