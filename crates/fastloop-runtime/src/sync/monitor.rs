//! Monitor: one mutex plus one condition

use fastloop_core::error::{abort_with, CoreError, CoreResult, OrAbort};

use super::{Condition, Mutex, MutexGuard, WaitStatus};
use crate::time::MicroTime;

/// Lock and wait/notify behind one object
///
/// All OS failures abort; a timeout comes back as `WaitStatus::TimedOut`.
///
/// ```rust,ignore
/// let mon = Monitor::new(Vec::new());
/// let mut items = mon.lock();
/// while items.is_empty() {
///     mon.wait(&mut items);
/// }
/// ```
pub struct Monitor<T> {
    mutex: Mutex<T>,
    cond: Condition,
}

impl<T> Monitor<T> {
    pub fn try_new(value: T) -> CoreResult<Self> {
        Ok(Self {
            mutex: Mutex::try_new(value)?,
            cond: Condition::try_new()?,
        })
    }

    #[track_caller]
    pub fn new(value: T) -> Self {
        Self::try_new(value).or_abort()
    }

    /// Enter the monitor. Dropping the guard leaves it.
    #[track_caller]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.mutex.lock()
    }

    #[track_caller]
    fn check_owner(&self, guard: &MutexGuard<'_, T>) {
        if !std::ptr::eq(guard.mutex, &self.mutex) {
            abort_with(&CoreError::Contract("monitor wait with a foreign guard"));
        }
    }

    /// Block until notified (or woken spuriously)
    #[track_caller]
    pub fn wait(&self, guard: &mut MutexGuard<'_, T>) {
        self.check_owner(guard);
        self.cond.wait(guard).or_abort()
    }

    /// Block until notified or until `deadline`; `MAX` waits forever.
    #[track_caller]
    pub fn timed_wait(&self, guard: &mut MutexGuard<'_, T>, deadline: MicroTime) -> WaitStatus {
        self.check_owner(guard);
        self.cond.timed_wait(guard, deadline).or_abort()
    }

    #[track_caller]
    pub fn notify(&self) {
        self.cond.notify().or_abort()
    }

    #[track_caller]
    pub fn notify_all(&self) {
        self.cond.notify_all().or_abort()
    }
}

impl<T: Default> Default for Monitor<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
