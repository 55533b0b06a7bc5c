//! Error types for caching-demo.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why a worker stopped without producing content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerFault {
    #[error("cancelled mid-computation")]
    Cancelled,

    #[error("worker pool is closed")]
    PoolClosed,

    #[error("worker panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("query timed out after {}ms (contention {contention})", .deadline.as_millis())]
    Timeout { deadline: Duration, contention: usize },

    #[error("query execution failed (contention {contention}): {cause}")]
    ExecutionFailure {
        #[source]
        cause: WorkerFault,
        contention: usize,
    },

    #[error("invalid work unit {id}: {reason}")]
    InvalidWorkUnit { id: i64, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Recovers an owned error from one shared between coalesced cache lookups.
impl From<Arc<Error>> for Error {
    fn from(shared: Arc<Error>) -> Self {
        Arc::try_unwrap(shared).unwrap_or_else(|shared| match &*shared {
            Error::Timeout {
                deadline,
                contention,
            } => Error::Timeout {
                deadline: *deadline,
                contention: *contention,
            },
            Error::ExecutionFailure { cause, contention } => Error::ExecutionFailure {
                cause: cause.clone(),
                contention: *contention,
            },
            Error::InvalidWorkUnit { id, reason } => Error::InvalidWorkUnit {
                id: *id,
                reason: reason.clone(),
            },
            Error::Config(msg) => Error::Config(msg.clone()),
            Error::Io(err) => Error::Io(std::io::Error::new(err.kind(), err.to_string())),
            Error::Other(msg) => Error::Other(msg.clone()),
        })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
