//! pthread condition variable

use std::cell::UnsafeCell;

use fastloop_core::error::{abort_with, CoreError, CoreResult, OrAbort};

use super::{MutexGuard, WaitStatus};
use crate::time::MicroTime;

/// Condition variable backed by `pthread_cond_t`
///
/// Deadlines are absolute `CLOCK_REALTIME` times, the same clock
/// [`MicroTime::now`] reads.
pub struct Condition {
    raw: Box<UnsafeCell<libc::pthread_cond_t>>,
}

// Safety: pthread condition variables are designed for cross-thread use.
unsafe impl Send for Condition {}
unsafe impl Sync for Condition {}

impl Condition {
    pub fn try_new() -> CoreResult<Self> {
        let raw = Box::new(UnsafeCell::new(libc::PTHREAD_COND_INITIALIZER));
        // Safety: raw points at writable, pinned storage.
        let rc = unsafe { libc::pthread_cond_init(raw.get(), std::ptr::null()) };
        if rc != 0 {
            return Err(CoreError::os("pthread_cond_init", rc));
        }
        Ok(Self { raw })
    }

    #[track_caller]
    pub fn new() -> Self {
        Self::try_new().or_abort()
    }

    /// Release the guard's mutex, block until notified, reacquire.
    pub fn wait<T>(&self, guard: &mut MutexGuard<'_, T>) -> CoreResult<()> {
        // Safety: the guard proves the calling thread holds this mutex.
        let rc = unsafe { libc::pthread_cond_wait(self.raw.get(), guard.mutex.raw()) };
        if rc != 0 {
            return Err(CoreError::os("pthread_cond_wait", rc));
        }
        Ok(())
    }

    /// Like [`wait`](Self::wait) but gives up at `deadline`.
    ///
    /// A `MAX` deadline waits without bound. A deadline already in the past
    /// returns `TimedOut` straight away.
    pub fn timed_wait<T>(
        &self,
        guard: &mut MutexGuard<'_, T>,
        deadline: MicroTime,
    ) -> CoreResult<WaitStatus> {
        if deadline.is_max() {
            self.wait(guard)?;
            return Ok(WaitStatus::Notified);
        }
        let ts = deadline.to_timespec();
        // Safety: the guard proves the calling thread holds this mutex.
        let rc = unsafe { libc::pthread_cond_timedwait(self.raw.get(), guard.mutex.raw(), &ts) };
        match rc {
            0 => Ok(WaitStatus::Notified),
            libc::ETIMEDOUT => Ok(WaitStatus::TimedOut),
            rc => Err(CoreError::os("pthread_cond_timedwait", rc)),
        }
    }

    /// Wake one waiter
    pub fn notify(&self) -> CoreResult<()> {
        // Safety: raw was initialized in try_new.
        let rc = unsafe { libc::pthread_cond_signal(self.raw.get()) };
        if rc != 0 {
            return Err(CoreError::os("pthread_cond_signal", rc));
        }
        Ok(())
    }

    /// Wake every waiter
    pub fn notify_all(&self) -> CoreResult<()> {
        // Safety: raw was initialized in try_new.
        let rc = unsafe { libc::pthread_cond_broadcast(self.raw.get()) };
        if rc != 0 {
            return Err(CoreError::os("pthread_cond_broadcast", rc));
        }
        Ok(())
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Condition {
    fn drop(&mut self) {
        // Safety: &mut self means nobody is waiting.
        let rc = unsafe { libc::pthread_cond_destroy(self.raw.get()) };
        if rc != 0 {
            abort_with(&CoreError::os("pthread_cond_destroy", rc));
        }
    }
}
