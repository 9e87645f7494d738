//! Blocking and cancellation behaviour across threads.
//!
//! # Running with tracing
//!
//! ```bash
//! RUST_LOG=fairq=trace cargo test --features tracing --test blocking -- --nocapture
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Once};
use std::thread;
use std::time::Duration;

use fairq::{BoundedQueue, CancelToken, Cancelled, DequeueError, EnqueueError};

static INIT_TRACING: Once = Once::new();

/// Initialize tracing for tests (only once).
fn init_test_tracing() {
    INIT_TRACING.call_once(|| {
        fairq::init_tracing();
    });
}

/// Long enough for a spawned thread to reach its wait on any sane scheduler.
const SETTLE: Duration = Duration::from_millis(50);

/// Rounds for tests that race `cancel` against a waiter that may not be parked.
const RACE_ROUNDS: usize = 500;

/// A waiter that has not returned after this long missed its wake-up.
const WAKE_BOUND: Duration = Duration::from_secs(5);

/// Runs `f` on a new thread and returns a queue its result lands in.
fn spawn_reporting<R, F>(f: F) -> BoundedQueue<R>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    let report = BoundedQueue::new(1).unwrap();
    let sender = report.clone();
    thread::spawn(move || sender.put(f()));
    report
}

fn wait_for_report<R: Send + 'static>(report: &BoundedQueue<R>, round: usize) -> R {
    match report.dequeue_timeout(WAKE_BOUND, &CancelToken::new()) {
        Ok(result) => result,
        Err(err) => panic!("round {round}: waiter still blocked ({err})"),
    }
}

#[test]
fn enqueue_blocks_on_full_queue_until_dequeue() {
    init_test_tracing();

    let queue = BoundedQueue::new(1).unwrap();
    let cancel = CancelToken::new();
    queue.enqueue('A', &cancel).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let producer = {
        let queue = queue.clone();
        let cancel = cancel.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            queue.enqueue('B', &cancel).unwrap();
            done.store(true, Ordering::Release);
        })
    };

    thread::sleep(SETTLE);
    assert!(!done.load(Ordering::Acquire), "enqueue returned while full");
    assert_eq!(queue.len(), 1);

    assert_eq!(queue.dequeue(&cancel).unwrap(), 'A');
    producer.join().unwrap();
    assert!(done.load(Ordering::Acquire));

    assert_eq!(queue.dequeue(&cancel).unwrap(), 'B');
    assert!(queue.is_empty());
}

#[test]
fn dequeue_blocks_on_empty_queue_until_enqueue() {
    init_test_tracing();

    let queue = BoundedQueue::new(2).unwrap();
    let cancel = CancelToken::new();

    let done = Arc::new(AtomicBool::new(false));
    let consumer = {
        let queue = queue.clone();
        let cancel = cancel.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let item = queue.dequeue(&cancel).unwrap();
            done.store(true, Ordering::Release);
            item
        })
    };

    thread::sleep(SETTLE);
    assert!(!done.load(Ordering::Acquire), "dequeue returned while empty");

    queue.enqueue(String::from("payload"), &cancel).unwrap();
    assert_eq!(consumer.join().unwrap(), "payload");
    assert!(queue.is_empty());
}

#[test]
fn cancelled_enqueue_leaves_queue_untouched() {
    init_test_tracing();

    let queue = BoundedQueue::new(1).unwrap();
    let cancel = CancelToken::new();
    queue.put(1u32);

    let waiter = {
        let queue = queue.clone();
        let cancel = cancel.clone();
        thread::spawn(move || queue.enqueue(2, &cancel))
    };

    thread::sleep(SETTLE);
    cancel.cancel();

    assert_eq!(waiter.join().unwrap(), Err(Cancelled(2)));
    assert_eq!(queue.len(), 1);
    assert!(queue.is_full());

    // The queue keeps working for everyone else.
    let fresh = CancelToken::new();
    assert_eq!(queue.dequeue(&fresh).unwrap(), 1);
    queue.enqueue(3, &fresh).unwrap();
    assert_eq!(queue.dequeue(&fresh).unwrap(), 3);
    assert!(queue.is_empty());
}

#[test]
fn cancelled_dequeue_leaves_queue_untouched() {
    init_test_tracing();

    let queue = BoundedQueue::<u32>::new(3).unwrap();
    let cancel = CancelToken::new();

    let waiter = {
        let queue = queue.clone();
        let cancel = cancel.clone();
        thread::spawn(move || queue.dequeue(&cancel))
    };

    thread::sleep(SETTLE);
    cancel.cancel();

    assert_eq!(waiter.join().unwrap(), Err(Cancelled(())));
    assert!(queue.is_empty());

    queue.put(9);
    assert_eq!(queue.take(), 9);
}

#[test]
fn one_token_cancels_every_waiter_across_queues() {
    init_test_tracing();

    let empty = BoundedQueue::<u64>::new(4).unwrap();
    let full = BoundedQueue::new(1).unwrap();
    full.put(0u64);
    let cancel = CancelToken::new();

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let queue = empty.clone();
            let cancel = cancel.clone();
            thread::spawn(move || queue.dequeue(&cancel))
        })
        .collect();

    let producers: Vec<_> = (1..=2u64)
        .map(|i| {
            let queue = full.clone();
            let cancel = cancel.clone();
            thread::spawn(move || queue.enqueue(i, &cancel))
        })
        .collect();

    thread::sleep(SETTLE);
    cancel.cancel();

    for consumer in consumers {
        assert_eq!(consumer.join().unwrap(), Err(Cancelled(())));
    }
    let mut returned: Vec<u64> = producers
        .into_iter()
        .map(|p| p.join().unwrap().unwrap_err().into_inner())
        .collect();
    returned.sort_unstable();
    assert_eq!(returned, vec![1, 2]);

    assert!(empty.is_empty());
    assert_eq!(full.len(), 1);
    assert_eq!(full.take(), 0);
}

#[test]
fn cancelling_one_waiter_does_not_disturb_another() {
    init_test_tracing();

    let queue = BoundedQueue::new(1).unwrap();
    let doomed = CancelToken::new();
    let patient = CancelToken::new();

    let cancelled = {
        let queue = queue.clone();
        let doomed = doomed.clone();
        thread::spawn(move || queue.dequeue(&doomed))
    };
    let survivor = {
        let queue = queue.clone();
        let patient = patient.clone();
        thread::spawn(move || queue.dequeue(&patient))
    };

    thread::sleep(SETTLE);
    doomed.cancel();
    assert_eq!(cancelled.join().unwrap(), Err(Cancelled(())));

    queue.put(42u32);
    assert_eq!(survivor.join().unwrap(), Ok(42));
    assert!(!patient.is_cancelled());
}

#[test]
fn cancel_during_timed_wait_wins_over_timeout() {
    init_test_tracing();

    let queue = BoundedQueue::<u8>::new(1).unwrap();
    let cancel = CancelToken::new();

    let waiter = {
        let queue = queue.clone();
        let cancel = cancel.clone();
        thread::spawn(move || queue.dequeue_timeout(Duration::from_secs(30), &cancel))
    };

    thread::sleep(SETTLE);
    cancel.cancel();
    assert_eq!(waiter.join().unwrap(), Err(DequeueError::Cancelled));

    queue.put(5);
    assert_eq!(
        queue.enqueue_timeout(6, Duration::from_millis(10), &CancelToken::new()),
        Err(EnqueueError::TimedOut(6))
    );
    assert_eq!(queue.take(), 5);
}

#[test]
fn cancel_racing_a_fresh_dequeue_always_wakes_it() {
    init_test_tracing();

    let queue = BoundedQueue::<u32>::new(1).unwrap();

    for round in 0..RACE_ROUNDS {
        let cancel = CancelToken::new();
        let report = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            spawn_reporting(move || queue.dequeue(&cancel))
        };

        cancel.cancel();

        assert_eq!(wait_for_report(&report, round), Err(Cancelled(())));
        assert!(queue.is_empty());
    }
}

#[test]
fn cancel_racing_a_put_never_loses_the_item() {
    init_test_tracing();

    let queue = BoundedQueue::<usize>::new(1).unwrap();

    for round in 0..RACE_ROUNDS {
        let cancel = CancelToken::new();
        let start = Arc::new(Barrier::new(3));

        let report = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            let start = Arc::clone(&start);
            spawn_reporting(move || {
                start.wait();
                queue.dequeue(&cancel)
            })
        };
        let producer = {
            let queue = queue.clone();
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                queue.put(round);
            })
        };

        start.wait();
        cancel.cancel();
        producer.join().unwrap();

        match wait_for_report(&report, round) {
            Ok(item) => {
                assert_eq!(item, round);
                assert!(queue.is_empty(), "round {round}: item delivered twice");
            }
            Err(Cancelled(())) => {
                assert_eq!(queue.try_dequeue(), Some(round), "round {round}: item lost");
            }
        }
        assert!(queue.is_empty());
    }
}

#[test]
fn cancel_racing_a_take_never_loses_the_item() {
    init_test_tracing();

    let queue = BoundedQueue::<usize>::new(1).unwrap();

    for round in 0..RACE_ROUNDS {
        queue.put(usize::MAX);
        let cancel = CancelToken::new();
        let start = Arc::new(Barrier::new(3));

        let report = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            let start = Arc::clone(&start);
            spawn_reporting(move || {
                start.wait();
                queue.enqueue(round, &cancel)
            })
        };
        let consumer = {
            let queue = queue.clone();
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                queue.take()
            })
        };

        start.wait();
        cancel.cancel();
        assert_eq!(consumer.join().unwrap(), usize::MAX);

        match wait_for_report(&report, round) {
            Ok(()) => {
                assert_eq!(queue.try_dequeue(), Some(round), "round {round}: item lost");
            }
            Err(Cancelled(item)) => {
                assert_eq!(item, round);
                assert!(queue.is_empty(), "round {round}: cancelled item was inserted");
            }
        }
        assert!(queue.is_empty());
    }
}
