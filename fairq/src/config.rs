//! Construction parameters for [`BoundedQueue`](crate::BoundedQueue).

use std::time::Duration;

use minstant::Instant;

/// Capacity used by [`QueueConfig::default`].
pub const DEFAULT_CAPACITY: usize = 1024;

/// How the queue's lock is handed over when an operation finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fairness {
    /// Release with `unlock_fair`: the longest-waiting contender gets the lock
    /// next, even if the releasing thread immediately tries to re-acquire it.
    #[default]
    Fair,
    /// Plain release. Faster under heavy contention, but a thread that keeps
    /// re-locking can overtake parked threads until `parking_lot`'s periodic
    /// fair unlock kicks in.
    Unfair,
}

/// Configuration for a bounded queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Maximum number of buffered items. Must be at least 1.
    pub capacity: usize,
    /// Lock release policy.
    pub fairness: Fairness,
}

impl QueueConfig {
    /// A fair configuration with the given capacity.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            fairness: Fairness::Fair,
        }
    }

    /// Replaces the lock release policy.
    #[must_use]
    pub const fn with_fairness(mut self, fairness: Fairness) -> Self {
        self.fairness = fairness;
        self
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Timeout specification for blocking operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Wait indefinitely.
    Infinite,
    /// Wait for at most the specified duration.
    Duration(Duration),
}

impl Timeout {
    /// Absolute deadline for a wait starting now, `None` if unbounded.
    ///
    /// A duration too large to represent as a deadline (e.g. `Duration::MAX`)
    /// is treated as [`Timeout::Infinite`].
    pub(crate) fn deadline(self) -> Option<Instant> {
        match self {
            Self::Infinite => None,
            Self::Duration(d) => {
                // minstant truncates the nanosecond count to u64 before its
                // overflow check.
                u64::try_from(d.as_nanos()).ok()?;
                Instant::now().checked_add(d)
            }
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}
