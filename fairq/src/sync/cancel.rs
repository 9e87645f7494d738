//! Cancellation of blocked queue operations.
//!
//! Threads cannot be interrupted from outside, so a caller that may need to
//! abandon a blocking `enqueue` or `dequeue` passes a [`CancelToken`]. Calling
//! [`CancelToken::cancel`] from any thread wakes every operation currently
//! parked with that token (or a clone of it), and each of them returns
//! `Cancelled` without touching the queue.
//!
//! # Wake-up protocol
//!
//! A waiter registers its queue on the token, then checks the flag, then parks;
//! all three happen while it holds the queue lock. `cancel` stores the flag,
//! snapshots the registrations, and locks each registered queue before
//! notifying it. If the snapshot misses a registration, the flag store is
//! already visible to that waiter's check. If it catches one, the notify cannot
//! run until the waiter has released the lock by parking.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::trace::debug;

/// Something parked threads can be woken out of.
pub(crate) trait Interrupt: Send + Sync {
    /// Wakes every thread parked on the target, under its lock.
    fn interrupt(&self);
}

struct Parked {
    id: u64,
    target: Arc<dyn Interrupt>,
}

struct TokenState {
    cancelled: AtomicBool,
    next_id: AtomicU64,
    parked: Mutex<Vec<Parked>>,
}

/// Shared cancellation flag for blocking queue operations.
///
/// Clones share state: cancelling one cancels all. Cancellation is permanent.
/// A token only interrupts *waiting*: an operation that can complete without
/// blocking succeeds even if its token is already cancelled.
#[derive(Clone)]
pub struct CancelToken {
    state: Arc<TokenState>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(TokenState {
                cancelled: AtomicBool::new(false),
                next_id: AtomicU64::new(0),
                parked: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Cancels the token and wakes every operation parked with it.
    ///
    /// Idempotent. Safe to call from any thread, including one that is not
    /// using the queue at all.
    pub fn cancel(&self) {
        if self.state.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        // Never hold the token lock while taking a queue lock: waiters take
        // them in the opposite order.
        let targets: Vec<Arc<dyn Interrupt>> = self
            .state
            .parked
            .lock()
            .iter()
            .map(|parked| Arc::clone(&parked.target))
            .collect();

        debug!(waiters = targets.len(), "cancel token fired");

        for target in targets {
            target.interrupt();
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// Records that the calling thread is about to park on `target`.
    ///
    /// The registration is removed when the returned guard drops.
    pub(crate) fn register(&self, target: Arc<dyn Interrupt>) -> Registration<'_> {
        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        self.state.parked.lock().push(Parked { id, target });
        Registration { token: self, id }
    }

    #[cfg(test)]
    fn parked_count(&self) -> usize {
        self.state.parked.lock().len()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Keeps a waiter visible to [`CancelToken::cancel`] while it may park.
pub(crate) struct Registration<'a> {
    token: &'a CancelToken,
    id: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.token
            .state
            .parked
            .lock()
            .retain(|parked| parked.id != self.id);
    }
}
