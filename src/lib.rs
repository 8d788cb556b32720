//! # axiom-monitor 🧵
//!
//! Monitor-style synchronization for threads that need to **hand work to each
//! other** and **read shared state cheaply**.
//!
//! The crate includes:
//!
//! - [`WorkQueue<T>`] — an unbounded FIFO where consumers block while it is empty
//!   (requires `std`).
//! - [`interrupt`] — per-thread interruption, so a consumer blocked in
//!   [`WorkQueue::get`] can be told to give up (requires `std`).
//! - [`StampedLock<T>`] — a read/write lock with optimistic, lock-free reads.
//! - [`BackOff`] — the exponential backoff behind `StampedLock`'s spin loops.
//!
//! ## ✨ Features
//!
//! - ✅ `no_std` compatible core (`StampedLock`, `BackOff`)
//! - ⚙️ `std` feature (default) for the blocking queue, interruption, and yielding backoff
//! - 📣 Broadcast wake-ups with re-check loops; no lost or duplicated items
//! - 🛑 Interrupts are reported, never swallowed
//!
//! ## 🚀 Quick Example
//!
//! ```rust
//! use axiom_monitor::{StampedLock, WorkQueue};
//! use std::thread;
//!
//! // Example 1: hand work to a consumer thread
//! let queue = WorkQueue::new();
//! let consumer = {
//!     let queue = queue.clone();
//!     thread::spawn(move || queue.get().unwrap())
//! };
//! queue.put("job");
//! assert_eq!(consumer.join().unwrap(), "job");
//!
//! // Example 2: optimistic reads
//! let point = StampedLock::new((0, 0));
//! point.store((3, 4));
//! assert_eq!(point.load(), (3, 4));
//! ```
//!
//! ## 🧠 Design
//!
//! ### WorkQueue
//!
//! A mutex-guarded [`VecDeque`](std::collections::VecDeque) paired with a
//! condition variable. `put` broadcasts when the queue leaves the empty state;
//! `get` waits in a loop and re-checks after every wake.
//!
//! ### StampedLock
//!
//! A version word that is odd while a writer is active. Optimistic readers
//! copy the data between two version reads and retry under a pessimistic read
//! lock if a writer got in between.
//!
//! ## 📦 Modules
//!
//! - [`backoff`] — Adaptive exponential backoff.
//! - [`stamped`] — Read/write lock with optimistic reads.
//! - [`work_queue`] — Blocking FIFO work queue.
//! - [`interrupt`] — Thread interruption.
//! - [`error`] — Wait errors.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod backoff;
pub mod stamped;

#[cfg(feature = "std")]
pub mod error;
#[cfg(feature = "std")]
pub mod interrupt;
#[cfg(feature = "std")]
pub mod work_queue;

pub use backoff::{BackOff, BackOffConfig};
pub use stamped::{Stamp, StampedLock, StampedReadGuard, StampedWriteGuard};

#[cfg(feature = "std")]
pub use error::WaitError;
#[cfg(feature = "std")]
pub use interrupt::Interrupter;
#[cfg(feature = "std")]
pub use work_queue::WorkQueue;
