//! # WorkQueue
//!
//! An unbounded, multi-producer multi-consumer FIFO where consumers **block**
//! while the queue is empty.
//!
//! The queue is a classic monitor: one [`parking_lot::Mutex`] guards the
//! backing [`VecDeque`], and one [`parking_lot::Condvar`] carries the
//! "not empty" signal.
//!
//! - [`WorkQueue::put`] appends under the lock. When that append takes the
//!   queue from empty to non-empty it wakes **every** waiting consumer.
//! - [`WorkQueue::get`] takes the head under the lock. While the queue is empty
//!   it suspends on the condvar and re-checks after each wake, because a wake
//!   does not mean a value is still there: several consumers woken by one
//!   broadcast race for a single item and only one wins.
//!
//! `get` can also be ended by [`Interrupter::interrupt`](crate::Interrupter::interrupt);
//! see [`interrupt`](crate::interrupt).
//!
//! ## Example
//! ```rust
//! use axiom_monitor::WorkQueue;
//! use std::thread;
//!
//! let queue = WorkQueue::new();
//! let producer = {
//!     let queue = queue.clone();
//!     thread::spawn(move || {
//!         for job in ["a", "b", "c"] {
//!             queue.put(job.to_string());
//!         }
//!     })
//! };
//!
//! let received: Vec<String> = (0..3).map(|_| queue.get().unwrap()).collect();
//! producer.join().unwrap();
//! assert_eq!(received, ["a", "b", "c"]);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::error::WaitError;
use crate::interrupt::{self, Unpark};

/// Blocking FIFO work queue.
///
/// `WorkQueue` is a handle: clones share the same underlying queue, so a
/// producer and a consumer thread each just take a clone.
pub struct WorkQueue<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
}

impl<T> WorkQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty queue with room for `capacity` items before reallocating.
    ///
    /// The queue is still unbounded.
    pub fn with_capacity(capacity: usize) -> Self {
        WorkQueue {
            shared: Arc::new(Shared {
                items: Mutex::new(VecDeque::with_capacity(capacity)),
                not_empty: Condvar::new(),
            }),
        }
    }

    /// Appends `value` at the tail.
    ///
    /// If the queue was empty, every suspended consumer is woken; each re-checks
    /// and all but the one that takes `value` go back to waiting.
    pub fn put(&self, value: T) {
        let mut items = self.shared.items.lock();
        items.push_back(value);
        if items.len() == 1 {
            let woken = self.shared.not_empty.notify_all();
            trace!(woken, "work queue became non-empty");
        }
    }

    /// Removes and returns the head, waiting as long as it takes.
    ///
    /// Interrupts do not end this wait. A pending interrupt is left set, so the
    /// caller can still observe it with [`interrupt::is_interrupted`].
    pub fn get_uninterruptibly(&self) -> T {
        let mut items = self.shared.items.lock();
        loop {
            if let Some(value) = items.pop_front() {
                return value;
            }
            self.shared.not_empty.wait(&mut items);
        }
    }

    /// Removes and returns the head if there is one. Never blocks.
    pub fn try_get(&self) -> Option<T> {
        self.shared.items.lock().pop_front()
    }

    /// Number of queued items at the moment of the call.
    pub fn len(&self) -> usize {
        self.shared.items.lock().len()
    }

    /// Whether the queue was empty at the moment of the call.
    pub fn is_empty(&self) -> bool {
        self.shared.items.lock().is_empty()
    }
}

impl<T: Send + 'static> WorkQueue<T> {
    /// Removes and returns the head, suspending while the queue is empty.
    ///
    /// A value that is already available is always returned, even when the
    /// calling thread has a pending interrupt.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Interrupted`] if the calling thread is interrupted
    /// while it would have to wait, including an interrupt that was already
    /// pending on entry. The interrupt flag is **not** cleared.
    pub fn get(&self) -> Result<T, WaitError> {
        let mut items = self.shared.items.lock();
        if let Some(value) = items.pop_front() {
            return Ok(value);
        }

        let interrupter = interrupt::current();
        // Registered while holding the queue lock; dropped before it is released.
        let _parked = interrupter.park_on(Arc::clone(&self.shared) as Arc<dyn Unpark>);
        loop {
            if interrupter.is_interrupted() {
                debug!(thread = ?interrupter.thread_id(), "work queue get interrupted");
                return Err(WaitError::Interrupted);
            }

            trace!("work queue empty, suspending");
            self.shared.not_empty.wait(&mut items);

            if let Some(value) = items.pop_front() {
                return Ok(value);
            }
            trace!("woken to an empty work queue");
        }
    }
}

impl<T: Send + 'static> Unpark for Shared<T> {
    fn unpark(&self) {
        // Taking the lock orders this wake after the waiter's flag check.
        let _items = self.items.lock();
        self.not_empty.notify_all();
    }
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        WorkQueue {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkQueue").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{self, RecvTimeoutError};
    use std::thread;
    use std::time::Duration;

    const PATIENCE: Duration = Duration::from_secs(5);
    const SETTLE: Duration = Duration::from_millis(100);

    #[test]
    fn test_single_producer_single_consumer_is_fifo() {
        let queue = WorkQueue::new();
        queue.put("a");
        queue.put("b");
        queue.put("c");

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.get(), Ok("a"));
        assert_eq!(queue.get(), Ok("b"));
        assert_eq!(queue.get(), Ok("c"));
        assert!(queue.is_empty());
        assert_eq!(queue.try_get(), None);
    }

    #[test]
    fn test_fifo_across_threads() {
        let queue = WorkQueue::with_capacity(16);
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || (0..100).map(|_| queue.get().unwrap()).collect::<Vec<u32>>())
        };

        for i in 0..100 {
            queue.put(i);
        }

        assert_eq!(consumer.join().unwrap(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_no_loss_no_duplication_many_producers_many_consumers() {
        let queue = WorkQueue::new();
        let mut producers = vec![];
        let mut consumers = vec![];

        for p in 0..4u32 {
            let queue = queue.clone();
            producers.push(thread::spawn(move || {
                for i in 0..250 {
                    queue.put(p * 250 + i);
                }
            }));
        }

        for _ in 0..4 {
            let queue = queue.clone();
            consumers.push(thread::spawn(move || {
                (0..250).map(|_| queue.get().unwrap()).collect::<Vec<u32>>()
            }));
        }

        for p in producers {
            p.join().unwrap();
        }
        let mut received: Vec<u32> = consumers.into_iter().flat_map(|c| c.join().unwrap()).collect();
        received.sort_unstable();

        assert_eq!(received, (0..1000).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_get_blocks_until_put() {
        let queue = WorkQueue::new();
        let (tx, rx) = mpsc::channel();

        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || tx.send(queue.get()).unwrap())
        };

        assert_eq!(rx.recv_timeout(SETTLE), Err(RecvTimeoutError::Timeout));

        queue.put(String::from("x"));
        assert_eq!(rx.recv_timeout(PATIENCE), Ok(Ok(String::from("x"))));
        consumer.join().unwrap();
    }

    #[test]
    fn test_ten_producers_one_consumer() {
        let queue = WorkQueue::new();
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || (0..10).map(|_| queue.get().unwrap()).collect::<Vec<String>>())
        };

        let producers: Vec<_> = (0..10)
            .map(|i| {
                let queue = queue.clone();
                thread::spawn(move || queue.put(format!("job-{i}")))
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        let mut received = consumer.join().unwrap();
        received.sort();
        let mut expected: Vec<String> = (0..10).map(|i| format!("job-{i}")).collect();
        expected.sort();
        assert_eq!(received, expected);
    }

    #[test]
    fn test_one_put_releases_exactly_one_of_many_waiters() {
        let queue = WorkQueue::new();
        let (tx, rx) = mpsc::channel();

        let consumers: Vec<_> = (0..5)
            .map(|_| {
                let queue = queue.clone();
                let tx = tx.clone();
                thread::spawn(move || tx.send(queue.get().unwrap()).unwrap())
            })
            .collect();
        drop(tx);

        thread::sleep(SETTLE);
        assert_eq!(rx.recv_timeout(SETTLE), Err(RecvTimeoutError::Timeout));

        queue.put(0);
        assert_eq!(rx.recv_timeout(PATIENCE), Ok(0));
        assert_eq!(
            rx.recv_timeout(SETTLE * 2),
            Err(RecvTimeoutError::Timeout),
            "A single put must release a single consumer"
        );

        for i in 1..5 {
            queue.put(i);
        }
        let mut rest: Vec<i32> = (0..4).map(|_| rx.recv_timeout(PATIENCE).unwrap()).collect();
        rest.sort_unstable();
        assert_eq!(rest, [1, 2, 3, 4]);

        for c in consumers {
            c.join().unwrap();
        }
    }

    #[test]
    fn test_interrupt_ends_wait_and_stays_observable() {
        let queue: WorkQueue<String> = WorkQueue::new();
        let (handle_tx, handle_rx) = mpsc::channel();

        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || {
                handle_tx.send(interrupt::current()).unwrap();
                let result = queue.get();
                (result, interrupt::is_interrupted())
            })
        };

        let handle = handle_rx.recv().unwrap();
        thread::sleep(SETTLE);
        handle.interrupt();

        let (result, observed) = consumer.join().unwrap();
        assert_eq!(result, Err(WaitError::Interrupted));
        assert!(observed, "Interrupt must still be visible after get returns");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pending_interrupt_does_not_hide_available_value() {
        let queue = WorkQueue::new();
        queue.put(42);

        interrupt::current().interrupt();
        assert_eq!(queue.get(), Ok(42));
        assert!(interrupt::is_interrupted());

        assert_eq!(queue.get(), Err(WaitError::Interrupted));
        assert!(interrupt::interrupted());

        queue.put(43);
        assert_eq!(queue.get(), Ok(43));
    }

    #[test]
    fn test_interrupted_consumer_does_not_disturb_others() {
        let queue = WorkQueue::new();
        let (handle_tx, handle_rx) = mpsc::channel();
        let (tx, rx) = mpsc::channel();

        let victim = {
            let queue = queue.clone();
            thread::spawn(move || {
                handle_tx.send(interrupt::current()).unwrap();
                queue.get()
            })
        };
        let survivor = {
            let queue = queue.clone();
            thread::spawn(move || tx.send(queue.get()).unwrap())
        };

        handle_rx.recv().unwrap().interrupt();
        assert_eq!(victim.join().unwrap(), Err(WaitError::Interrupted));
        assert_eq!(rx.recv_timeout(SETTLE), Err(RecvTimeoutError::Timeout));

        queue.put(7u8);
        assert_eq!(rx.recv_timeout(PATIENCE), Ok(Ok(7)));
        survivor.join().unwrap();
    }

    #[test]
    fn test_get_uninterruptibly_waits_through_interrupts() {
        let queue = WorkQueue::new();
        let (handle_tx, handle_rx) = mpsc::channel();
        let (tx, rx) = mpsc::channel();

        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || {
                handle_tx.send(interrupt::current()).unwrap();
                let value = queue.get_uninterruptibly();
                tx.send(value).unwrap();
                interrupt::is_interrupted()
            })
        };

        handle_rx.recv().unwrap().interrupt();
        assert_eq!(rx.recv_timeout(SETTLE), Err(RecvTimeoutError::Timeout));

        queue.put("late");
        assert_eq!(rx.recv_timeout(PATIENCE), Ok("late"));
        assert!(consumer.join().unwrap(), "Interrupt flag must survive the wait");
    }

    #[test]
    fn test_debug_reports_length() {
        let queue = WorkQueue::default();
        queue.put(1);
        queue.put(2);
        assert_eq!(format!("{queue:?}"), "WorkQueue { len: 2 }");
    }
}
