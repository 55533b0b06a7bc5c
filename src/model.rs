//! Core data model.
//!
//! A work unit is one simulated query against the slow backend. Content is
//! what a successful query hands back; it is what the cache stores.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Work Unit
// ---------------------------------------------------------------------------

/// Parameters of a single simulated query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Content identifier. Also the cache key.
    pub id: i64,

    /// Number of filler characters in the produced body.
    pub size: i32,

    /// How long the query takes on an idle backend.
    pub nominal_duration_ms: i64,
}

impl WorkUnit {
    pub fn new(id: i64, size: i32, nominal_duration_ms: i64) -> Self {
        Self {
            id,
            size,
            nominal_duration_ms,
        }
    }

    /// Reject malformed input before it can take a pool slot.
    pub fn validate(&self) -> Result<()> {
        if self.size < 0 {
            return Err(Error::InvalidWorkUnit {
                id: self.id,
                reason: format!("size must be >= 0, got {}", self.size),
            });
        }
        if self.nominal_duration_ms < 0 {
            return Err(Error::InvalidWorkUnit {
                id: self.id,
                reason: format!(
                    "nominal duration must be >= 0, got {}ms",
                    self.nominal_duration_ms
                ),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Filler character used for content bodies.
pub const BODY_FILLER: char = '*';

/// The artifact produced by a completed query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub id: i64,
    pub size: i32,
    pub duration: i64,
    pub title: String,
    pub body: String,
}

impl Content {
    /// Build the content a finished query produces for `work`.
    ///
    /// Callers must have validated `work`; a negative size yields an empty body.
    pub fn for_work(work: &WorkUnit) -> Self {
        let len = usize::try_from(work.size).unwrap_or(0);
        Self {
            id: work.id,
            size: work.size,
            duration: work.nominal_duration_ms,
            title: format!("Title {}", work.id),
            body: BODY_FILLER.to_string().repeat(len),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle state of a single query inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryState {
    /// Accepted by the engine, not yet counted.
    Submitted,
    /// Counted in the contention gauge, waiting for a pool slot.
    Admitted,
    /// Holding a pool slot, worker is simulating.
    Running,
    /// Content produced. Terminal.
    Completed,
    /// Deadline elapsed first. Terminal.
    TimedOut,
    /// Worker fault or shutdown. Terminal.
    Failed,
}

impl QueryState {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: QueryState) -> bool {
        use QueryState::*;
        matches!(
            (self, to),
            (Submitted, Admitted)
                | (Admitted, Running)
                | (Admitted, TimedOut)  // deadline while queued for a slot
                | (Admitted, Failed)    // pool closed while queued
                | (Running, Completed)
                | (Running, TimedOut)
                | (Running, Failed)
        )
    }

    /// Is this a terminal state?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            QueryState::Completed | QueryState::TimedOut | QueryState::Failed
        )
    }
}

impl std::fmt::Display for QueryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QueryState::Submitted => "submitted",
            QueryState::Admitted => "admitted",
            QueryState::Running => "running",
            QueryState::Completed => "completed",
            QueryState::TimedOut => "timed_out",
            QueryState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}
