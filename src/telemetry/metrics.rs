//! Metric instrument factories for caching-demo.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without a provider the instruments are no-ops.

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("caching-demo")
}

/// Counter: terminal query outcomes.
/// Labels: `outcome` ("completed" | "timed_out" | "failed" | "invalid").
pub fn query_outcomes() -> Counter<u64> {
    meter()
        .u64_counter("caching_demo.query.outcomes")
        .with_description("Number of queries by terminal outcome")
        .build()
}

/// Histogram: wall-clock query duration in milliseconds, admission to outcome.
/// Labels: `outcome`.
pub fn query_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("caching_demo.query.duration_ms")
        .with_description("Query duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Gauge: in-flight queries, recorded on every admission and release.
pub fn contention() -> Gauge<u64> {
    meter()
        .u64_gauge("caching_demo.contention")
        .with_description("Queries admitted but not yet terminal")
        .build()
}

/// Counter: cache lookups.
/// Labels: `result` ("hit" | "miss").
pub fn cache_lookups() -> Counter<u64> {
    meter()
        .u64_counter("caching_demo.cache.lookups")
        .with_description("Content cache lookups")
        .build()
}
