//! # caching-demo
//!
//! A simulated slow backend behind a memoizing content service.
//!
//! The backend is a bounded query engine: a fixed pool of slots, latency that
//! grows with the number of in-flight queries, caller deadlines with
//! cancellation, and typed failures. The content service puts a
//! get-or-compute cache in front of it.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod service;
pub mod telemetry;

pub use error::{Error, Result};
