//! Producer/consumer demo for [`WorkQueue`].
//!
//! Four producers push jobs, three consumers pull them. Once every job has been
//! handled the consumers are still blocked in `get`, so `main` interrupts them
//! and they exit cleanly.
//!
//! Run with `RUST_LOG=trace cargo run --example producer_consumer` to see the
//! queue's suspend and wake events.

use std::sync::mpsc;
use std::thread;

use axiom_monitor::{interrupt, WaitError, WorkQueue};
use tracing::info;
use tracing_subscriber::EnvFilter;

const PRODUCERS: usize = 4;
const CONSUMERS: usize = 3;
const JOBS_PER_PRODUCER: usize = 25;

fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();

    let queue: WorkQueue<String> = WorkQueue::new();
    let (handles_tx, handles_rx) = mpsc::channel();

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|id| {
            let queue = queue.clone();
            let handles_tx = handles_tx.clone();
            thread::spawn(move || {
                let _ = handles_tx.send(interrupt::current());
                let mut handled = 0usize;
                loop {
                    match queue.get() {
                        Ok(job) => {
                            handled += 1;
                            info!(consumer = id, %job, "handled job");
                        }
                        Err(WaitError::Interrupted) => {
                            info!(consumer = id, handled, "consumer interrupted, shutting down");
                            return handled;
                        }
                    }
                }
            })
        })
        .collect();
    drop(handles_tx);

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|id| {
            let queue = queue.clone();
            thread::spawn(move || {
                for n in 0..JOBS_PER_PRODUCER {
                    queue.put(format!("p{id}-job{n}"));
                }
            })
        })
        .collect();

    for producer in producers {
        let _ = producer.join();
    }

    // Consumers drain before they are told to stop.
    while !queue.is_empty() {
        thread::yield_now();
    }
    for handle in handles_rx.iter().take(CONSUMERS) {
        handle.interrupt();
    }

    let total: usize = consumers.into_iter().filter_map(|c| c.join().ok()).sum();
    info!(total, expected = PRODUCERS * JOBS_PER_PRODUCER, "all consumers stopped");
}
