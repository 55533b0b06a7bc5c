//! Throttled worker: simulates a query whose latency grows with contention.

use crate::error::WorkerFault;
use crate::model::{Content, WorkUnit};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::gauge::ContentionGauge;

/// Largest slice of nominal work simulated between contention samples.
pub const MAX_CHUNK_MS: u64 = 200;

/// Slowdown multiplier for a given contention level. Never below 1.
pub fn load_factor(contention: usize, cpu_divisor: usize) -> u64 {
    let factor = contention / cpu_divisor.max(1);
    factor.max(1) as u64
}

/// Runs work units under the slowdown implied by the shared gauge.
#[derive(Debug, Clone)]
pub struct ThrottledWorker {
    gauge: ContentionGauge,
    cpu_divisor: usize,
}

impl ThrottledWorker {
    pub fn new(gauge: ContentionGauge, cpu_divisor: usize) -> Self {
        Self { gauge, cpu_divisor }
    }

    /// Current load factor, sampled from the gauge.
    pub fn current_load_factor(&self) -> u64 {
        load_factor(self.gauge.current(), self.cpu_divisor)
    }

    /// Spend the work's nominal duration, scaled per chunk by the load factor
    /// at the start of that chunk, then build its content.
    ///
    /// Stops at the next suspension point once `cancel` fires.
    pub async fn run(
        &self,
        work: &WorkUnit,
        cancel: &CancellationToken,
    ) -> Result<Content, WorkerFault> {
        let mut remaining = u64::try_from(work.nominal_duration_ms).unwrap_or(0);

        if cancel.is_cancelled() {
            return Err(WorkerFault::Cancelled);
        }

        while remaining > 0 {
            let chunk = remaining.min(MAX_CHUNK_MS);
            let factor = self.current_load_factor();
            let elapsed = Duration::from_millis(chunk.saturating_mul(factor));

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(id = work.id, remaining_ms = remaining, "worker cancelled");
                    return Err(WorkerFault::Cancelled);
                }
                _ = tokio::time::sleep(elapsed) => {}
            }

            remaining -= chunk;
            debug!(
                id = work.id,
                chunk_ms = chunk,
                load_factor = factor,
                remaining_ms = remaining,
                "chunk done"
            );
        }

        Ok(Content::for_work(work))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_factor_is_at_least_one() {
        assert_eq!(load_factor(0, 20), 1);
        assert_eq!(load_factor(19, 20), 1);
        assert_eq!(load_factor(20, 20), 1);
    }

    #[test]
    fn load_factor_grows_with_contention() {
        assert_eq!(load_factor(40, 20), 2);
        assert_eq!(load_factor(100, 20), 5);
        assert_eq!(load_factor(7, 1), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_run_takes_nominal_duration() {
        let worker = ThrottledWorker::new(ContentionGauge::new(), 20);
        let work = WorkUnit::new(3, 4, 450);
        let start = tokio::time::Instant::now();

        let content = worker.run(&work, &CancellationToken::new()).await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(450), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(500), "{elapsed:?}");
        assert_eq!(content.title, "Title 3");
        assert_eq!(content.body, "****");
    }

    #[tokio::test(start_paused = true)]
    async fn contention_scales_each_chunk() {
        let gauge = ContentionGauge::new();
        let _held: Vec<_> = (0..3).map(|_| gauge.admit()).collect();
        let worker = ThrottledWorker::new(gauge, 1);
        let start = tokio::time::Instant::now();

        worker
            .run(&WorkUnit::new(1, 0, 300), &CancellationToken::new())
            .await
            .unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(950), "{elapsed:?}");
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_work() {
        let worker = ThrottledWorker::new(ContentionGauge::new(), 20);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = worker.run(&WorkUnit::new(1, 1, 10_000), &cancel).await;
        assert_eq!(result, Err(WorkerFault::Cancelled));
    }
}
