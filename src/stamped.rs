//! # StampedLock
//!
//! A `no_std`-compatible read/write lock with an **optimistic read** mode.
//!
//! Three ways in:
//! - [`StampedLock::write`]: exclusive access, waits for pessimistic readers to leave.
//! - [`StampedLock::read`]: shared access, excludes writers for the guard's lifetime.
//! - [`StampedLock::try_optimistic_read`] + [`StampedLock::validate`]: no lock at
//!   all. Take a stamp, copy the data out, then check that no writer got in
//!   between. If one did, retry with a pessimistic read.
//!
//! [`StampedLock::load`] packages the optimistic-then-pessimistic pattern for
//! `Copy` data.
//!
//! ## Example
//! ```rust
//! use axiom_monitor::StampedLock;
//!
//! let lock = StampedLock::new((1, 1));
//! lock.store((2, 2));
//!
//! let stamp = lock.try_optimistic_read();
//! let (x, y) = lock.load();
//! assert!(lock.validate(stamp));
//! assert_eq!(x, y);
//! ```
//!
//! Writers are not fair. A steady stream of pessimistic readers can delay a
//! writer that has already claimed the version word, but cannot starve it: new
//! readers back off as soon as the version goes odd.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::ptr;
use core::sync::atomic::{
    fence, AtomicUsize,
    Ordering::{Acquire, Relaxed, Release, SeqCst},
};

use crate::{BackOff, BackOffConfig};

/// Version snapshot returned by [`StampedLock::try_optimistic_read`].
///
/// Odd stamps were taken while a writer held the lock and never validate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Stamp(usize);

impl Stamp {
    /// Whether this stamp was taken with no writer present.
    #[inline(always)]
    pub const fn is_valid_candidate(self) -> bool {
        self.0 & WRITER == 0
    }
}

const WRITER: usize = 1;

/// Read/write lock with optimistic reads.
pub struct StampedLock<T> {
    // Odd while write-locked; bumped by one on write acquire and again on release.
    version: AtomicUsize,
    readers: AtomicUsize,
    backoff: BackOffConfig,
    data: UnsafeCell<T>,
}

/// Exclusive guard returned by [`StampedLock::write`].
pub struct StampedWriteGuard<'a, T> {
    lock: &'a StampedLock<T>,
}

/// Shared guard returned by [`StampedLock::read`].
pub struct StampedReadGuard<'a, T> {
    lock: &'a StampedLock<T>,
}

impl<T> StampedLock<T> {
    /// Creates an unlocked `StampedLock` with default backoff tuning.
    #[inline(always)]
    pub const fn new(data: T) -> Self {
        Self::with_backoff(data, BackOffConfig::DEFAULT)
    }

    /// Creates an unlocked `StampedLock` whose spin loops use `backoff`.
    #[inline(always)]
    pub const fn with_backoff(data: T, backoff: BackOffConfig) -> Self {
        StampedLock {
            version: AtomicUsize::new(0),
            readers: AtomicUsize::new(0),
            backoff,
            data: UnsafeCell::new(data),
        }
    }

    /// Acquires the write lock, spinning until every other holder is gone.
    pub fn write(&self) -> StampedWriteGuard<'_, T> {
        let backoff = BackOff::with_config(self.backoff);
        loop {
            if let Some(guard) = self.claim_version() {
                // Version is ours; readers that slipped in before it went odd drain out.
                while self.readers.load(SeqCst) != 0 {
                    backoff.wait();
                }
                return guard;
            }
            backoff.wait();
        }
    }

    /// Attempts to take the write lock without waiting.
    ///
    /// Fails if a writer or any pessimistic reader currently holds the lock.
    pub fn try_write(&self) -> Option<StampedWriteGuard<'_, T>> {
        let guard = self.claim_version()?;
        if self.readers.load(SeqCst) != 0 {
            // Drop bumps the version, which also invalidates stamps taken meanwhile.
            drop(guard);
            return None;
        }
        Some(guard)
    }

    /// Acquires a shared, pessimistic read lock.
    pub fn read(&self) -> StampedReadGuard<'_, T> {
        let backoff = BackOff::with_config(self.backoff);
        loop {
            if let Some(guard) = self.try_read() {
                return guard;
            }
            backoff.wait();
        }
    }

    /// Attempts to take a shared read lock without waiting.
    pub fn try_read(&self) -> Option<StampedReadGuard<'_, T>> {
        if self.version.load(Relaxed) & WRITER != 0 {
            return None;
        }
        self.readers.fetch_add(1, SeqCst);
        if self.version.load(SeqCst) & WRITER != 0 {
            self.readers.fetch_sub(1, Release);
            return None;
        }
        Some(StampedReadGuard { lock: self })
    }

    /// Returns a stamp for a later [`validate`](StampedLock::validate).
    ///
    /// Never blocks. If a writer is active the returned stamp is already stale.
    #[inline]
    pub fn try_optimistic_read(&self) -> Stamp {
        Stamp(self.version.load(Acquire))
    }

    /// Whether no write lock has been acquired since `stamp` was issued.
    #[inline]
    pub fn validate(&self, stamp: Stamp) -> bool {
        fence(Acquire);
        stamp.is_valid_candidate() && self.version.load(Relaxed) == stamp.0
    }

    /// Whether a writer currently holds (or is draining readers for) the lock.
    #[inline(always)]
    pub fn is_write_locked(&self) -> bool {
        self.version.load(Acquire) & WRITER != 0
    }

    /// Runs `f` under a pessimistic read lock.
    #[inline]
    pub fn with_read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.read();
        f(&guard)
    }

    /// Runs `f` under the write lock.
    #[inline]
    pub fn with_write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.write();
        f(&mut guard)
    }

    /// Replaces the protected value under the write lock.
    #[inline]
    pub fn store(&self, value: T) {
        *self.write() = value;
    }

    /// Mutable access without locking; the borrow checker guarantees exclusivity.
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Consumes the lock and returns the protected value.
    #[inline]
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    fn claim_version(&self) -> Option<StampedWriteGuard<'_, T>> {
        let current = self.version.load(Relaxed);
        if current & WRITER != 0 {
            return None;
        }
        self.version
            .compare_exchange(current, current + 1, SeqCst, Relaxed)
            .ok()?;
        // Order the odd version before any data write seen by optimistic readers.
        fence(Release);
        Some(StampedWriteGuard { lock: self })
    }
}

impl<T: Copy> StampedLock<T> {
    /// Copies the value out, optimistically first.
    ///
    /// Falls back to a pessimistic read if a writer interfered with the
    /// optimistic copy.
    pub fn load(&self) -> T {
        let stamp = self.try_optimistic_read();
        if stamp.is_valid_candidate() {
            // SAFETY: the pointer is valid for the lifetime of `self`. A concurrent
            // writer may race with this copy; `T: Copy` has no drop glue and the
            // copy is discarded unless `validate` proves no writer was present.
            let value = unsafe { ptr::read_volatile(self.data.get()) };
            if self.validate(stamp) {
                return value;
            }
        }
        *self.read()
    }
}

impl<T: Default> Default for StampedLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Drop for StampedWriteGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.version.fetch_add(1, Release);
    }
}

impl<T> Drop for StampedReadGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.readers.fetch_sub(1, Release);
    }
}

impl<T> Deref for StampedWriteGuard<'_, T> {
    type Target = T;
    #[inline(always)]
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for StampedWriteGuard<'_, T> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Deref for StampedReadGuard<'_, T> {
    type Target = T;
    #[inline(always)]
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

// Safety: writers are exclusive and readers only ever hand out shared references.
unsafe impl<T: Send> Send for StampedLock<T> {}
unsafe impl<T: Send + Sync> Sync for StampedLock<T> {}
