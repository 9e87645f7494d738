//! A fair, bounded, blocking queue for handing work between threads.
//!
//! [`BoundedQueue`] is a fixed-capacity FIFO. Producers block while it is full,
//! consumers block while it is empty, and the single lock that guards it is
//! handed over first-come-first-served so a fast producer/consumer pair cannot
//! starve a slower thread. Blocked calls can be abandoned through a
//! [`CancelToken`] without disturbing the queue.
//!
//! # Example
//!
//! ```
//! use std::thread;
//!
//! use fairq::{BoundedQueue, CancelToken};
//!
//! let queue = BoundedQueue::<u32>::new(4).unwrap();
//! let cancel = CancelToken::new();
//!
//! let producer = {
//!     let queue = queue.clone();
//!     let cancel = cancel.clone();
//!     thread::spawn(move || {
//!         for i in 0..100u32 {
//!             queue.enqueue(i, &cancel).unwrap();
//!         }
//!     })
//! };
//!
//! for expected in 0..100u32 {
//!     assert_eq!(queue.dequeue(&cancel).unwrap(), expected);
//! }
//! producer.join().unwrap();
//! ```

pub mod config;
pub mod error;
pub mod sync;
mod trace;

pub use config::{DEFAULT_CAPACITY, Fairness, QueueConfig, Timeout};
pub use error::{Cancelled, DequeueError, EnqueueError, Full, InvalidCapacity};
pub use sync::bounded::BoundedQueue;
pub use sync::cancel::CancelToken;
pub use trace::init_tracing;
