//! # BackOff
//!
//! Exponential backoff for the spin loops inside [`StampedLock`](crate::StampedLock).
//!
//! Every call to [`BackOff::wait`] spins for the current count and then doubles
//! it, up to [`BackOffConfig::max_spin`]. With the `std` feature the thread also
//! yields once the count has grown past [`BackOffConfig::yield_threshold`], so a
//! reader stuck behind a slow writer stops burning its whole time slice.
//!
//! ## Example
//! ```rust
//! use axiom_monitor::{BackOff, BackOffConfig};
//!
//! let backoff = BackOff::with_config(BackOffConfig::DEFAULT.with_start(8));
//! let mut attempts = 0;
//! while attempts < 3 {
//!     attempts += 1;
//!     backoff.wait();
//! }
//! assert_eq!(backoff.current(), 64);
//! ```

use core::{cell::Cell, hint::spin_loop};

/// Tuning knobs for [`BackOff`].
///
/// Values are clamped on construction: `start` is at least `1` and never
/// above `max_spin`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackOffConfig {
    start: u32,
    max_spin: u32,
    yield_threshold: u32,
}

impl BackOffConfig {
    /// 32 initial spins, capped at `1 << 22`, yielding past `1 << 10`.
    pub const DEFAULT: Self = Self::new(1 << 5, 1 << 22, 1 << 10);

    /// Creates a configuration, clamping `start` into `1..=max_spin`.
    pub const fn new(start: u32, max_spin: u32, yield_threshold: u32) -> Self {
        let max_spin = if max_spin == 0 { 1 } else { max_spin };
        let start = if start == 0 {
            1
        } else if start > max_spin {
            max_spin
        } else {
            start
        };
        Self {
            start,
            max_spin,
            yield_threshold,
        }
    }

    /// Returns a copy with a different starting spin count.
    pub const fn with_start(self, start: u32) -> Self {
        Self::new(start, self.max_spin, self.yield_threshold)
    }

    /// Returns a copy with a different spin ceiling.
    pub const fn with_max_spin(self, max_spin: u32) -> Self {
        Self::new(self.start, max_spin, self.yield_threshold)
    }

    /// Returns a copy with a different yield threshold.
    ///
    /// Has no effect without the `std` feature.
    pub const fn with_yield_threshold(self, yield_threshold: u32) -> Self {
        Self::new(self.start, self.max_spin, yield_threshold)
    }

    /// Spin count used for the first wait.
    pub const fn start(&self) -> u32 {
        self.start
    }

    /// Upper bound for the spin count.
    pub const fn max_spin(&self) -> u32 {
        self.max_spin
    }

    /// Spin count above which the thread yields (under `std`).
    pub const fn yield_threshold(&self) -> u32 {
        self.yield_threshold
    }
}

impl Default for BackOffConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Per-loop exponential backoff state.
///
/// Not `Sync`: create one per retry loop, on the stack of the spinning thread.
pub struct BackOff {
    spin: Cell<u32>,
    config: BackOffConfig,
}

impl BackOff {
    /// Creates a backoff using [`BackOffConfig::DEFAULT`].
    #[inline(always)]
    pub const fn new() -> Self {
        Self::with_config(BackOffConfig::DEFAULT)
    }

    /// Creates a backoff with custom tuning.
    #[inline(always)]
    pub const fn with_config(config: BackOffConfig) -> Self {
        Self {
            spin: Cell::new(config.start),
            config,
        }
    }

    /// Spins for the current count, then doubles it (saturating at `max_spin`).
    ///
    /// Under the `std` feature the thread yields once the count that was just
    /// spun exceeds the yield threshold.
    #[inline]
    pub fn wait(&self) {
        let end = self.spin.get();

        for _ in 0..end {
            spin_loop();
        }

        self.spin.set(end.saturating_mul(2).min(self.config.max_spin));

        #[cfg(feature = "std")]
        if end > self.config.yield_threshold {
            std::thread::yield_now();
        }
    }

    /// Halves the spin count, never going below one.
    #[inline]
    pub fn relax(&self) {
        self.spin.set((self.spin.get() >> 1).max(1));
    }

    /// Returns the spin count the next [`wait`](BackOff::wait) will use.
    #[inline(always)]
    pub fn current(&self) -> u32 {
        self.spin.get()
    }

    /// Whether the spin count has reached its ceiling.
    #[inline(always)]
    pub fn is_saturated(&self) -> bool {
        self.spin.get() >= self.config.max_spin
    }

    /// Restores the configured starting spin count.
    #[inline(always)]
    pub fn reset(&self) {
        self.spin.set(self.config.start);
    }

    /// The configuration this backoff was built with.
    #[inline(always)]
    pub const fn config(&self) -> BackOffConfig {
        self.config
    }
}

impl Default for BackOff {
    fn default() -> Self {
        Self::new()
    }
}
