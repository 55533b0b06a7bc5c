//! Bounded query engine: admission, pool slots, deadlines, typed outcomes.

use crate::config::EngineConfig;
use crate::error::{Error, Result, WorkerFault};
use crate::model::{Content, QueryState, WorkUnit};
use crate::telemetry::metrics;
use crate::telemetry::query::{record_state_transition, start_query_span};
use opentelemetry::KeyValue;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, warn};
use uuid::Uuid;

use super::gauge::ContentionGauge;
use super::worker::ThrottledWorker;

/// Runs simulated queries on a fixed number of slots.
///
/// Requests beyond `pool_size` wait for a slot without limit; only the
/// deadline surfaces overload. Clones share the pool, gauge and shutdown
/// signal.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    config: EngineConfig,
    gauge: ContentionGauge,
    slots: Arc<Semaphore>,
    worker: ThrottledWorker,
    shutdown: CancellationToken,
}

impl QueryEngine {
    /// Create an engine with its own contention gauge.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_gauge(config, ContentionGauge::new())
    }

    /// Create an engine that reports into an existing gauge.
    pub fn with_gauge(config: EngineConfig, gauge: ContentionGauge) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            slots: Arc::new(Semaphore::new(config.pool_size)),
            worker: ThrottledWorker::new(gauge.clone(), config.cpu_divisor),
            gauge,
            config,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn gauge(&self) -> &ContentionGauge {
        &self.gauge
    }

    /// Current contention, for diagnostics.
    pub fn contention(&self) -> usize {
        self.gauge.current()
    }

    /// Free pool slots right now.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Cancel all in-flight work and close the pool.
    ///
    /// Running queries end in `ExecutionFailure`; so does anything submitted
    /// afterwards.
    pub fn shutdown(&self) {
        info!(contention = self.gauge.current(), "query engine shutting down");
        self.shutdown.cancel();
        self.slots.close();
    }

    /// [`QueryEngine::execute_query`] with the configured query timeout.
    pub async fn query(&self, work: WorkUnit) -> Result<Content> {
        self.execute_query(work, self.config.query_timeout()).await
    }

    /// Run one query, waiting at most `deadline` for its content.
    ///
    /// Invalid work is rejected before admission. Otherwise the request is
    /// counted in the gauge until this call returns (or is dropped), whatever
    /// the outcome. On timeout the worker is asked to stop but may run until
    /// its next suspension point.
    pub async fn execute_query(&self, work: WorkUnit, deadline: Duration) -> Result<Content> {
        if let Err(e) = work.validate() {
            warn!(id = work.id, error = %e, "rejected work unit");
            metrics::query_outcomes().add(1, &[KeyValue::new("outcome", "invalid")]);
            return Err(e);
        }

        let request_id = Uuid::new_v4();
        let span = start_query_span(&work, &request_id);

        let admission = self.gauge.admit();
        record_state_transition(&span, QueryState::Submitted, QueryState::Admitted);
        metrics::contention().record(admission.level_at_admit() as u64, &[]);

        let cancel = self.shutdown.child_token();
        // Dropping this future mid-wait must stop the worker as well.
        let _stop_on_exit = cancel.clone().drop_guard();
        let running = Arc::new(AtomicBool::new(false));
        let started = Instant::now();

        let task = tokio::spawn(
            dispatch(
                Arc::clone(&self.slots),
                self.worker.clone(),
                work,
                cancel.clone(),
                Arc::clone(&running),
                span.clone(),
            )
            .instrument(span.clone()),
        );

        let outer = span.clone();
        async move {
            let outcome = tokio::time::timeout(deadline, task).await;
            let from = if running.load(Ordering::Acquire) {
                QueryState::Running
            } else {
                QueryState::Admitted
            };

            let (result, to, label) = match outcome {
                Ok(Ok(Ok(content))) => (Ok(content), QueryState::Completed, "completed"),
                Ok(Ok(Err(cause))) => (Err(cause), QueryState::Failed, "failed"),
                Ok(Err(join_err)) => (
                    Err(WorkerFault::Panicked(join_err.to_string())),
                    QueryState::Failed,
                    "failed",
                ),
                Err(_) => {
                    cancel.cancel();
                    let contention = self.gauge.current();
                    let remaining = admission.release();
                    let to = QueryState::TimedOut;
                    self.finish(&span, from, to, "timed_out", started, remaining);
                    warn!(
                        id = work.id,
                        deadline_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                        contention,
                        "query timed out"
                    );
                    return Err(Error::Timeout {
                        deadline,
                        contention,
                    });
                }
            };

            let contention = self.gauge.current();
            let remaining = admission.release();
            self.finish(&span, from, to, label, started, remaining);

            match result {
                Ok(content) => {
                    debug!(id = work.id, contention, "query completed");
                    Ok(content)
                }
                Err(cause) => {
                    error!(id = work.id, contention, %cause, "query failed");
                    Err(Error::ExecutionFailure { cause, contention })
                }
            }
        }
        .instrument(outer)
        .await
    }

    fn finish(
        &self,
        span: &Span,
        from: QueryState,
        to: QueryState,
        label: &'static str,
        started: Instant,
        remaining: usize,
    ) {
        record_state_transition(span, from, to);
        let attrs = [KeyValue::new("outcome", label)];
        metrics::query_outcomes().add(1, &attrs);
        metrics::query_duration_ms().record(started.elapsed().as_secs_f64() * 1000.0, &attrs);
        metrics::contention().record(remaining as u64, &[]);
    }
}

/// Wait for a slot, then run the worker while holding it.
async fn dispatch(
    slots: Arc<Semaphore>,
    worker: ThrottledWorker,
    work: WorkUnit,
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
    span: Span,
) -> std::result::Result<Content, WorkerFault> {
    let _slot = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(WorkerFault::Cancelled),
        permit = slots.acquire_owned() => permit.map_err(|_| WorkerFault::PoolClosed)?,
    };

    running.store(true, Ordering::Release);
    record_state_transition(&span, QueryState::Admitted, QueryState::Running);
    debug!(load_factor = worker.current_load_factor(), "slot acquired");

    worker.run(&work, &cancel).await
}
