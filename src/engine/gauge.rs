//! Contention gauge: how many queries are admitted but not yet terminal.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Process-wide in-flight counter shared by the engine and its workers.
///
/// Cloning is cheap and every clone reads the same counter.
#[derive(Debug, Clone, Default)]
pub struct ContentionGauge {
    in_flight: Arc<AtomicUsize>,
}

impl ContentionGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a new request. The returned token releases on drop.
    pub fn admit(&self) -> Admission {
        let level = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(contention = level, "admitted");
        Admission {
            gauge: self.clone(),
            level_at_admit: level,
            released: false,
        }
    }

    /// Current number of admitted, non-terminal requests.
    pub fn current(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Saturating decrement; returns the level after the release.
    fn decrement(&self) -> usize {
        let prev = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or(0);
        prev.saturating_sub(1)
    }
}

/// One admitted request's share of the gauge.
///
/// Exactly one release per admission: either [`Admission::release`] or drop.
#[derive(Debug)]
#[must_use = "dropping an admission releases it immediately"]
pub struct Admission {
    gauge: ContentionGauge,
    level_at_admit: usize,
    released: bool,
}

impl Admission {
    /// Contention observed at admission, this request included.
    pub fn level_at_admit(&self) -> usize {
        self.level_at_admit
    }

    /// Release explicitly and return the contention left behind.
    pub fn release(mut self) -> usize {
        self.released = true;
        self.gauge.decrement()
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        if !self.released {
            self.gauge.decrement();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admit_counts_the_new_request() {
        let gauge = ContentionGauge::new();
        let first = gauge.admit();
        let second = gauge.admit();
        assert_eq!(first.level_at_admit(), 1);
        assert_eq!(second.level_at_admit(), 2);
        assert_eq!(gauge.current(), 2);

        assert_eq!(second.release(), 1);
        drop(first);
        assert_eq!(gauge.current(), 0);
    }

    #[test]
    fn explicit_release_is_not_repeated_on_drop() {
        let gauge = ContentionGauge::new();
        let _held = gauge.admit();
        let admission = gauge.admit();
        assert_eq!(admission.release(), 1);
        assert_eq!(gauge.current(), 1);
    }

    #[test]
    fn decrement_saturates_at_zero() {
        let gauge = ContentionGauge::new();
        assert_eq!(gauge.decrement(), 0);
        assert_eq!(gauge.current(), 0);
    }
}
