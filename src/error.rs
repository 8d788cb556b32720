//! Errors surfaced by blocking waits.

/// Why a blocking wait ended without producing a value.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The waiting thread was interrupted.
    ///
    /// The thread's interrupt flag is left set, so callers further up the stack
    /// still see it through [`interrupt::is_interrupted`](crate::interrupt::is_interrupted).
    #[error("thread interrupted while waiting")]
    Interrupted,
}
