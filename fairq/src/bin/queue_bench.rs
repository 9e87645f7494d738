//! Bounded queue throughput and worst-case wait benchmark.
//!
//! Usage:
//!     cargo run --release --bin queue_bench
//!
//! Environment variables:
//!     PRODUCERS=4     Producer threads (default: 4)
//!     CONSUMERS=4     Consumer threads (default: 4)
//!     CAPACITY=64     Queue capacity (default: 64)
//!     ITEMS=1000000   Items per producer (default: 1000000)
//!     PIN_CPUS=1      Pin thread i to core i (default: off)

use std::env;
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use minstant::Instant;

use fairq::{BoundedQueue, CancelToken, Fairness, QueueConfig};

type Payload = u64;

struct Settings {
    producers: usize,
    consumers: usize,
    capacity: usize,
    items: usize,
    pin_cpus: bool,
}

fn env_or(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn settings() -> Settings {
    Settings {
        producers: env_or("PRODUCERS", 4).max(1),
        consumers: env_or("CONSUMERS", 4).max(1),
        capacity: env_or("CAPACITY", 64).max(1),
        items: env_or("ITEMS", 1_000_000),
        pin_cpus: env_or("PIN_CPUS", 0) != 0,
    }
}

fn pin_to_cpu(enabled: bool, index: usize) {
    if !enabled {
        return;
    }
    if let Some(cores) = core_affinity::get_core_ids()
        && !cores.is_empty()
    {
        core_affinity::set_for_current(cores[index % cores.len()]);
    }
}

/// Splits `total` as evenly as possible over `parts`.
fn share(total: usize, parts: usize, index: usize) -> usize {
    total / parts + usize::from(index < total % parts)
}

struct Report {
    elapsed: Duration,
    worst_put: Duration,
    worst_take: Duration,
}

fn run(settings: &Settings, fairness: Fairness) -> Report {
    let queue = BoundedQueue::<Payload>::with_config(
        QueueConfig::new(settings.capacity).with_fairness(fairness),
    )
    .unwrap();
    let cancel = CancelToken::new();
    let threads = settings.producers + settings.consumers;
    let barrier = Arc::new(Barrier::new(threads + 1));
    let total = settings.producers * settings.items;

    let producers: Vec<JoinHandle<Duration>> = (0..settings.producers)
        .map(|p| {
            let queue = queue.clone();
            let cancel = cancel.clone();
            let barrier = Arc::clone(&barrier);
            let items = settings.items;
            let pin = settings.pin_cpus;
            thread::spawn(move || {
                pin_to_cpu(pin, p);
                barrier.wait();
                let mut worst = Duration::ZERO;
                for i in 0..items as Payload {
                    let start = Instant::now();
                    queue.enqueue(i, &cancel).unwrap();
                    worst = worst.max(start.elapsed());
                }
                worst
            })
        })
        .collect();

    let consumers: Vec<JoinHandle<Duration>> = (0..settings.consumers)
        .map(|c| {
            let queue = queue.clone();
            let cancel = cancel.clone();
            let barrier = Arc::clone(&barrier);
            let count = share(total, settings.consumers, c);
            let pin = settings.pin_cpus;
            let cpu = settings.producers + c;
            thread::spawn(move || {
                pin_to_cpu(pin, cpu);
                barrier.wait();
                let mut worst = Duration::ZERO;
                for _ in 0..count {
                    let start = Instant::now();
                    queue.dequeue(&cancel).unwrap();
                    worst = worst.max(start.elapsed());
                }
                worst
            })
        })
        .collect();

    barrier.wait();
    let start = Instant::now();

    let worst_put = producers
        .into_iter()
        .map(|h| h.join().unwrap())
        .max()
        .unwrap_or_default();
    let worst_take = consumers
        .into_iter()
        .map(|h| h.join().unwrap())
        .max()
        .unwrap_or_default();

    Report {
        elapsed: start.elapsed(),
        worst_put,
        worst_take,
    }
}

fn main() {
    fairq::init_tracing();
    let settings = settings();
    let total = settings.producers * settings.items;

    println!(
        "fairq BoundedQueue (producers={}, consumers={}, capacity={}, items={}):",
        settings.producers, settings.consumers, settings.capacity, total
    );

    for fairness in [Fairness::Fair, Fairness::Unfair] {
        let report = run(&settings, fairness);
        let ops_per_ms = total as u128 * 1_000_000 / report.elapsed.as_nanos().max(1);
        println!(
            "{fairness:?}: {ops_per_ms} ops/ms, worst put {:?}, worst take {:?}",
            report.worst_put, report.worst_take
        );
    }
}
