//! # Thread interruption
//!
//! Rust threads cannot be interrupted by the runtime, so this module keeps a
//! small per-thread interrupt state instead. Any thread can grab an
//! [`Interrupter`] for itself with [`current`], hand it to another thread, and
//! that thread can later call [`Interrupter::interrupt`].
//!
//! Interrupting does two things:
//! 1. sets the target thread's interrupt flag, which stays set until the
//!    target calls [`interrupted`];
//! 2. if the target is suspended in an interruptible wait such as
//!    [`WorkQueue::get`](crate::WorkQueue::get), wakes it so it can notice.
//!
//! Waits never clear the flag on the caller's behalf. A wait that gives up
//! because of an interrupt reports it and leaves the flag for outer code.
//!
//! ## Example
//! ```rust
//! use axiom_monitor::{interrupt, WaitError, WorkQueue};
//! use std::{sync::mpsc, thread};
//!
//! let queue: WorkQueue<String> = WorkQueue::new();
//! let (tx, rx) = mpsc::channel();
//!
//! let consumer = {
//!     let queue = queue.clone();
//!     thread::spawn(move || {
//!         tx.send(interrupt::current()).unwrap();
//!         let result = queue.get();
//!         (result, interrupt::is_interrupted())
//!     })
//! };
//!
//! rx.recv().unwrap().interrupt();
//! let (result, still_flagged) = consumer.join().unwrap();
//! assert_eq!(result, Err(WaitError::Interrupted));
//! assert!(still_flagged);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::trace;

/// Something a suspended thread can be woken from.
///
/// Implementors must take the same lock the waiter checks the flag under
/// before signaling, otherwise the wake can land between check and suspend.
pub(crate) trait Unpark: Send + Sync {
    fn unpark(&self);
}

#[derive(Default)]
struct InterruptState {
    flag: AtomicBool,
    parked_on: Mutex<Option<Arc<dyn Unpark>>>,
}

thread_local! {
    static CURRENT: Arc<InterruptState> = Arc::new(InterruptState::default());
}

/// Handle to one thread's interrupt state.
///
/// Cheap to clone and safe to send anywhere; it keeps the state alive even
/// after the thread has exited, at which point interrupting it is a no-op.
#[derive(Clone)]
pub struct Interrupter {
    state: Arc<InterruptState>,
    thread: ThreadId,
}

/// Returns the interrupt handle of the calling thread.
pub fn current() -> Interrupter {
    CURRENT.with(|state| Interrupter {
        state: Arc::clone(state),
        thread: thread::current().id(),
    })
}

/// Whether the calling thread has a pending interrupt. Does not clear it.
pub fn is_interrupted() -> bool {
    CURRENT.with(|state| state.flag.load(SeqCst))
}

/// Clears the calling thread's interrupt flag, returning its previous value.
pub fn interrupted() -> bool {
    CURRENT.with(|state| state.flag.swap(false, SeqCst))
}

impl Interrupter {
    /// Sets the target's interrupt flag and wakes it if it is suspended in an
    /// interruptible wait.
    pub fn interrupt(&self) {
        self.state.flag.store(true, SeqCst);
        // Clone out so the registration lock is not held while unparking.
        let target = self.state.parked_on.lock().clone();
        trace!(thread = ?self.thread, parked = target.is_some(), "interrupt delivered");
        if let Some(target) = target {
            target.unpark();
        }
    }

    /// Whether the target thread has a pending interrupt.
    pub fn is_interrupted(&self) -> bool {
        self.state.flag.load(SeqCst)
    }

    /// Id of the thread this handle interrupts.
    pub fn thread_id(&self) -> ThreadId {
        self.thread
    }

    /// Registers `target` as the thing to wake while the returned guard lives.
    ///
    /// Must be called on the thread that owns this state, before it checks
    /// the flag and suspends.
    pub(crate) fn park_on(&self, target: Arc<dyn Unpark>) -> Parked<'_> {
        *self.state.parked_on.lock() = Some(target);
        Parked { state: &self.state }
    }
}

impl fmt::Debug for Interrupter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interrupter")
            .field("thread", &self.thread)
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

/// Clears the wake registration on drop.
pub(crate) struct Parked<'a> {
    state: &'a InterruptState,
}

impl Drop for Parked<'_> {
    fn drop(&mut self) {
        self.state.parked_on.lock().take();
    }
}
