//! Fair, bounded, blocking MPMC queue.
//!
//! One `parking_lot` mutex owns the buffer. Two condition variables tied to
//! that mutex park producers (`space_available`) and consumers
//! (`item_available`). Every operation follows the same shape:
//!
//! 1. lock,
//! 2. while the precondition fails, park on its condition and re-test,
//! 3. mutate the buffer,
//! 4. wake one waiter on the opposite condition,
//! 5. unlock (fairly, unless configured otherwise).
//!
//! # Example
//!
//! ```
//! use fairq::{BoundedQueue, CancelToken};
//!
//! let queue = BoundedQueue::new(2).unwrap();
//! let cancel = CancelToken::new();
//!
//! queue.enqueue("a", &cancel).unwrap();
//! queue.enqueue("b", &cancel).unwrap();
//! assert!(queue.is_full());
//!
//! assert_eq!(queue.dequeue(&cancel).unwrap(), "a");
//! assert_eq!(queue.dequeue(&cancel).unwrap(), "b");
//! ```
//!
//! # Differences from [`std::sync::mpsc::sync_channel`]
//!
//! - Any number of consumers; the queue handle is `Clone`
//! - Lock hand-off is FIFO-fair by default
//! - Blocked calls can be abandoned through a [`CancelToken`]

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use minstant::Instant;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::config::{Fairness, QueueConfig, Timeout};
use crate::error::{Cancelled, DequeueError, EnqueueError, Full, InvalidCapacity};
use crate::sync::cancel::{CancelToken, Interrupt};
use crate::trace::{debug, trace, warn};

type Items<'a, T> = MutexGuard<'a, VecDeque<T>>;

/// Which side of the queue a waiter is on.
#[derive(Debug, Clone, Copy)]
enum Side {
    Producer,
    Consumer,
}

/// Why a wait ended without its precondition holding.
#[derive(Debug, Clone, Copy)]
enum Interrupted {
    Cancelled,
    TimedOut,
}

struct Shared<T> {
    capacity: usize,
    fairness: Fairness,
    items: Mutex<VecDeque<T>>,
    space_available: Condvar,
    item_available: Condvar,
}

impl<T> Shared<T> {
    fn is_blocked(&self, items: &VecDeque<T>, side: Side) -> bool {
        match side {
            Side::Producer => items.len() == self.capacity,
            Side::Consumer => items.is_empty(),
        }
    }

    fn condition(&self, side: Side) -> &Condvar {
        match side {
            Side::Producer => &self.space_available,
            Side::Consumer => &self.item_available,
        }
    }

    fn release(&self, items: Items<'_, T>) {
        match self.fairness {
            Fairness::Fair => MutexGuard::unlock_fair(items),
            Fairness::Unfair => drop(items),
        }
    }

    /// Appends `item` and hands the lock over. Caller has checked for space.
    fn commit_push(&self, mut items: Items<'_, T>, item: T) {
        debug_assert!(items.len() < self.capacity);
        items.push_back(item);
        self.item_available.notify_one();
        self.release(items);
    }

    /// Removes the head, if any, and hands the lock over.
    fn commit_pop(&self, mut items: Items<'_, T>) -> Option<T> {
        let item = items.pop_front();
        if item.is_some() {
            self.space_available.notify_one();
        }
        self.release(items);
        item
    }
}

impl<T: Send + 'static> Shared<T> {
    /// Parks until `side` may proceed, the token is cancelled, or the deadline
    /// passes.
    ///
    /// The precondition is re-tested after every wake-up, and before the
    /// cancellation and deadline checks, so a waiter that was signalled for an
    /// item or slot always takes it. The token is registered only once the
    /// caller actually has to wait.
    fn park_while_blocked(
        self: &Arc<Self>,
        items: &mut Items<'_, T>,
        side: Side,
        cancel: &CancelToken,
        deadline: Option<Instant>,
    ) -> Result<(), Interrupted> {
        let mut registration = None;

        while self.is_blocked(&**items, side) {
            if registration.is_none() {
                registration = Some(cancel.register(Arc::clone(self) as Arc<dyn Interrupt>));
            }

            if cancel.is_cancelled() {
                debug!(side = ?side, len = items.len(), "wait cancelled");
                return Err(Interrupted::Cancelled);
            }

            trace!(side = ?side, len = items.len(), capacity = self.capacity, "parking");
            let condition = self.condition(side);
            match deadline {
                None => condition.wait(items),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        debug!(side = ?side, len = items.len(), "wait timed out");
                        return Err(Interrupted::TimedOut);
                    }
                    // A timed-out wait still loops back to re-test the
                    // precondition before giving up.
                    let _ = condition.wait_for(items, deadline.duration_since(now));
                }
            }
            trace!(side = ?side, len = items.len(), "woken");
        }

        Ok(())
    }
}

impl<T: Send> Interrupt for Shared<T> {
    fn interrupt(&self) {
        let items = self.items.lock();
        self.space_available.notify_all();
        self.item_available.notify_all();
        self.release(items);
    }
}

/// Fixed-capacity FIFO queue with blocking, cancellable insert and remove.
///
/// Cloning the handle is cheap and every clone refers to the same queue. The
/// buffer and its items are dropped with the last handle.
///
/// # Thread Safety
///
/// `BoundedQueue<T>` is [`Send`] and [`Sync`] when `T: Send`. Any number of
/// producers and consumers may call into the same queue concurrently.
pub struct BoundedQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> BoundedQueue<T> {
    /// Creates a fair queue that holds at most `capacity` items.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCapacity`] if `capacity` is zero, negative, or does not
    /// fit in `usize`.
    ///
    /// # Example
    ///
    /// ```
    /// use fairq::BoundedQueue;
    ///
    /// assert!(BoundedQueue::<u8>::new(1).is_ok());
    /// assert!(BoundedQueue::<u8>::new(0).is_err());
    /// assert!(BoundedQueue::<u8>::new(-5).is_err());
    /// ```
    pub fn new<C>(capacity: C) -> Result<Self, InvalidCapacity>
    where
        C: TryInto<usize> + fmt::Display + Copy,
    {
        let Ok(converted) = capacity.try_into() else {
            warn!(requested = %capacity, "rejecting unrepresentable queue capacity");
            return Err(InvalidCapacity {
                requested: capacity.to_string(),
            });
        };
        Self::with_config(QueueConfig::new(converted))
    }

    /// Creates a queue from an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCapacity`] if `config.capacity` is zero.
    pub fn with_config(config: QueueConfig) -> Result<Self, InvalidCapacity> {
        if config.capacity == 0 {
            warn!("rejecting zero queue capacity");
            return Err(InvalidCapacity {
                requested: config.capacity.to_string(),
            });
        }

        debug!(
            capacity = config.capacity,
            fairness = ?config.fairness,
            "queue constructed"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                capacity: config.capacity,
                fairness: config.fairness,
                items: Mutex::new(VecDeque::with_capacity(config.capacity)),
                space_available: Condvar::new(),
                item_available: Condvar::new(),
            }),
        })
    }

    /// Maximum number of buffered items.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Lock release policy chosen at construction.
    #[must_use]
    pub fn fairness(&self) -> Fairness {
        self.shared.fairness
    }

    /// Number of buffered items at the moment the lock was held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.items.lock().len()
    }

    /// Whether the queue held no items at the moment the lock was held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.items.lock().is_empty()
    }

    /// Whether the queue was at capacity at the moment the lock was held.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.shared.items.lock().len() == self.shared.capacity
    }

    /// Blocks until there is space, then appends `item`. Cannot be cancelled.
    pub fn put(&self, item: T) {
        let shared = &*self.shared;
        let mut items = shared.items.lock();
        while shared.is_blocked(&items, Side::Producer) {
            shared.space_available.wait(&mut items);
        }
        shared.commit_push(items, item);
    }

    /// Blocks until an item is available, then removes the head. Cannot be
    /// cancelled.
    pub fn take(&self) -> T {
        let shared = &*self.shared;
        let mut items = shared.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                shared.space_available.notify_one();
                shared.release(items);
                return item;
            }
            shared.item_available.wait(&mut items);
        }
    }

    /// Appends `item` if there is space, without waiting.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(item))` if the queue is full, allowing retry.
    pub fn try_enqueue(&self, item: T) -> Result<(), Full<T>> {
        let items = self.shared.items.lock();
        if self.shared.is_blocked(&items, Side::Producer) {
            self.shared.release(items);
            return Err(Full(item));
        }
        self.shared.commit_push(items, item);
        Ok(())
    }

    /// Removes the head if there is one, without waiting.
    #[must_use]
    pub fn try_dequeue(&self) -> Option<T> {
        let items = self.shared.items.lock();
        self.shared.commit_pop(items)
    }
}

impl<T: Send + 'static> BoundedQueue<T> {
    /// Blocks until there is space, then appends `item` at the tail.
    ///
    /// `T: 'static` is required because a parked caller registers the queue on
    /// `cancel` as a type-erased wake target. Queues of borrowed items can use
    /// [`put`](Self::put) and [`try_enqueue`](Self::try_enqueue) instead.
    ///
    /// # Errors
    ///
    /// Returns `Err(Cancelled(item))` if `cancel` fires while waiting. The
    /// queue is left untouched.
    pub fn enqueue(&self, item: T, cancel: &CancelToken) -> Result<(), Cancelled<T>> {
        self.enqueue_timeout(item, Timeout::Infinite, cancel)
            .map_err(|err| Cancelled(err.into_inner()))
    }

    /// Blocks until an item is available, then removes and returns the head.
    ///
    /// Requires `T: 'static` for the same reason as [`enqueue`](Self::enqueue).
    /// [`take`](Self::take) and [`try_dequeue`](Self::try_dequeue) have no such
    /// bound.
    ///
    /// # Errors
    ///
    /// Returns `Err(Cancelled(()))` if `cancel` fires while waiting. The queue
    /// is left untouched.
    pub fn dequeue(&self, cancel: &CancelToken) -> Result<T, Cancelled> {
        self.dequeue_timeout(Timeout::Infinite, cancel)
            .map_err(|_| Cancelled(()))
    }

    /// Like [`enqueue`](Self::enqueue), but gives up once `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`EnqueueError::Cancelled`] or [`EnqueueError::TimedOut`], each
    /// carrying `item` back. The queue is left untouched.
    pub fn enqueue_timeout(
        &self,
        item: T,
        timeout: impl Into<Timeout>,
        cancel: &CancelToken,
    ) -> Result<(), EnqueueError<T>> {
        let deadline = timeout.into().deadline();
        let mut items = self.shared.items.lock();

        match self
            .shared
            .park_while_blocked(&mut items, Side::Producer, cancel, deadline)
        {
            Ok(()) => {
                self.shared.commit_push(items, item);
                Ok(())
            }
            Err(interrupted) => {
                self.shared.release(items);
                Err(match interrupted {
                    Interrupted::Cancelled => EnqueueError::Cancelled(item),
                    Interrupted::TimedOut => EnqueueError::TimedOut(item),
                })
            }
        }
    }

    /// Like [`dequeue`](Self::dequeue), but gives up once `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`DequeueError::Cancelled`] or [`DequeueError::TimedOut`]. The
    /// queue is left untouched.
    pub fn dequeue_timeout(
        &self,
        timeout: impl Into<Timeout>,
        cancel: &CancelToken,
    ) -> Result<T, DequeueError> {
        let deadline = timeout.into().deadline();
        let mut items = self.shared.items.lock();

        loop {
            if let Some(item) = items.pop_front() {
                self.shared.space_available.notify_one();
                self.shared.release(items);
                return Ok(item);
            }

            if let Err(interrupted) =
                self.shared
                    .park_while_blocked(&mut items, Side::Consumer, cancel, deadline)
            {
                self.shared.release(items);
                return Err(match interrupted {
                    Interrupted::Cancelled => DequeueError::Cancelled,
                    Interrupted::TimedOut => DequeueError::TimedOut,
                });
            }
        }
    }
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.shared.capacity)
            .field("len", &self.len())
            .field("fairness", &self.shared.fairness)
            .finish()
    }
}
