//! Simulated backend: contention gauge, throttled worker, bounded query engine.

pub mod gauge;
pub mod query;
pub mod worker;

pub use gauge::{Admission, ContentionGauge};
pub use query::QueryEngine;
pub use worker::{MAX_CHUNK_MS, ThrottledWorker, load_factor};
