//! Blocking synchronization over pthread primitives
//!
//! [`Mutex`] and [`Condition`] map one-to-one onto `pthread_mutex_t` and
//! `pthread_cond_t`. [`Monitor`] pairs one of each behind a single surface
//! and is what the queues block on.
//!
//! Initialization and operation failures are environment failures: the
//! primitives report them as `CoreError::Os`, and the guard/monitor layer
//! turns them into an abort. A timed wait that expires is not an error and
//! comes back as [`WaitStatus::TimedOut`].

mod condition;
mod monitor;
mod mutex;

pub use condition::Condition;
pub use monitor::Monitor;
pub use mutex::{Mutex, MutexGuard};

/// Outcome of a condition wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// Woken by a notify, or spuriously. Callers re-check their predicate.
    Notified,
    /// The deadline passed
    TimedOut,
}

impl WaitStatus {
    #[inline]
    pub fn timed_out(self) -> bool {
        self == WaitStatus::TimedOut
    }
}
