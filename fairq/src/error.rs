//! Error types returned by queue construction and queue operations.
//!
//! Errors that arise while an item is in flight hand the item back to the
//! caller, so a failed `enqueue` never loses data.

use std::error::Error;
use std::fmt;

use thiserror::Error;

/// The requested capacity was zero, negative, or not representable as `usize`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("queue capacity must be at least 1, got {requested}")]
pub struct InvalidCapacity {
    /// The rejected value, as the caller wrote it.
    pub requested: String,
}

/// A blocked operation was cancelled through its [`CancelToken`](crate::CancelToken).
///
/// For `enqueue` the payload is the item that was not inserted. For `dequeue`
/// it is `()`. In both cases the queue is exactly as it was before the call.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Cancelled<T = ()>(pub T);

impl<T> Cancelled<T> {
    /// Returns the item that was not enqueued.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Cancelled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cancelled").finish_non_exhaustive()
    }
}

impl<T> fmt::Display for Cancelled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("operation cancelled while waiting on the queue")
    }
}

impl<T> Error for Cancelled<T> {}

/// Returned by `try_enqueue` when the queue has no free slot.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Returns the item that was not enqueued.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Full").finish_non_exhaustive()
    }
}

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue is full")
    }
}

impl<T> Error for Full<T> {}

/// Failure of a bounded-wait enqueue. Both variants carry the item back.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError<T> {
    /// The token was cancelled while the caller waited for space.
    Cancelled(T),
    /// No slot freed up before the deadline.
    TimedOut(T),
}

impl<T> EnqueueError<T> {
    /// Returns the item that was not enqueued.
    pub fn into_inner(self) -> T {
        match self {
            Self::Cancelled(item) | Self::TimedOut(item) => item,
        }
    }

    /// Whether the wait ended because the deadline passed.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }
}

impl<T> fmt::Debug for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled(_) => f.debug_tuple("Cancelled").finish_non_exhaustive(),
            Self::TimedOut(_) => f.debug_tuple("TimedOut").finish_non_exhaustive(),
        }
    }
}

impl<T> fmt::Display for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled(_) => f.write_str("enqueue cancelled while waiting for space"),
            Self::TimedOut(_) => f.write_str("enqueue timed out waiting for space"),
        }
    }
}

impl<T> Error for EnqueueError<T> {}

impl<T> From<Cancelled<T>> for EnqueueError<T> {
    fn from(err: Cancelled<T>) -> Self {
        Self::Cancelled(err.0)
    }
}

/// Failure of a bounded-wait dequeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DequeueError {
    /// The token was cancelled while the caller waited for an item.
    #[error("dequeue cancelled while waiting for an item")]
    Cancelled,
    /// No item arrived before the deadline.
    #[error("dequeue timed out waiting for an item")]
    TimedOut,
}

impl From<Cancelled> for DequeueError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}
