//! Spin lock with three-tier backoff
//!
//! The lock word is 0 (unlocked) or 1 (locked) and sits alone on its cache
//! line. Acquisition spins on a plain load and only issues the atomic
//! test-and-set when the word looks free. Under contention the waiter backs
//! off in three capped stages:
//!
//! 1. exponential `cpu_pause` bursts, up to `pause_max` iterations
//! 2. up to `yield_max` voluntary yields
//! 3. sleeps that double from 1 ms up to `sleep_max_ms`
//!
//! No ownership tracking, no reentrancy, no fairness. Keep critical
//! sections short.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU32, Ordering};

use crate::atomic::{cpu_pause_n, membar, test_and_set};
use crate::error::OrAbort;
use crate::thread::{sleep_ms, yield_now};

/// Tunable backoff thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Largest single pause burst; bursts double from 1 until they reach it
    pub pause_max: u32,
    /// Number of yields after the pause stage
    pub yield_max: u32,
    /// Cap for the doubling sleep, in milliseconds
    pub sleep_max_ms: u64,
}

impl BackoffConfig {
    pub const DEFAULT_PAUSE_MAX: u32 = 32;
    pub const DEFAULT_YIELD_MAX: u32 = 8;
    pub const DEFAULT_SLEEP_MAX_MS: u64 = 512;

    /// Thresholds the spin lock uses unless told otherwise
    pub const fn new() -> Self {
        Self {
            pause_max: Self::DEFAULT_PAUSE_MAX,
            yield_max: Self::DEFAULT_YIELD_MAX,
            sleep_max_ms: Self::DEFAULT_SLEEP_MAX_MS,
        }
    }

    pub fn pause_max(mut self, n: u32) -> Self {
        self.pause_max = n;
        self
    }

    pub fn yield_max(mut self, n: u32) -> Self {
        self.yield_max = n;
        self
    }

    pub fn sleep_max_ms(mut self, ms: u64) -> Self {
        self.sleep_max_ms = ms;
        self
    }

    /// Reject thresholds that would make the sleep stage a busy loop
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.sleep_max_ms == 0 {
            return Err("sleep_max_ms must be > 0");
        }
        Ok(())
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Which tier a backoff step used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStep {
    /// Spun for this many pause iterations
    Pause(u32),
    /// Yielded the CPU
    Yield,
    /// Slept for this many milliseconds
    Sleep(u64),
}

/// Per-acquisition backoff state
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    pause: u32,
    yields: u32,
    sleep: u64,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            pause: 1,
            yields: 0,
            sleep: 1,
        }
    }

    /// Wait once, escalating to the next tier when the current one is spent
    pub fn snooze(&mut self) -> BackoffStep {
        if self.pause < self.config.pause_max {
            let n = self.pause;
            cpu_pause_n(n);
            self.pause <<= 1;
            BackoffStep::Pause(n)
        } else if self.yields < self.config.yield_max {
            self.yields += 1;
            yield_now();
            BackoffStep::Yield
        } else {
            let ms = self.sleep;
            sleep_ms(ms);
            if self.sleep < self.config.sleep_max_ms {
                self.sleep = (self.sleep << 1).min(self.config.sleep_max_ms);
            }
            BackoffStep::Sleep(ms)
        }
    }
}

/// Lock word padded to a cache line so neighbours never share it
#[repr(align(64))]
struct LockWord(AtomicU32);

/// A spin lock protecting a `T`
///
/// # Example
///
/// ```
/// use fastloop_core::SpinLock;
///
/// let lock = SpinLock::new(0u32);
/// *lock.lock() += 1;
/// assert_eq!(*lock.lock(), 1);
/// ```
pub struct SpinLock<T> {
    word: LockWord,
    backoff: BackoffConfig,
    data: UnsafeCell<T>,
}

// Safety: SpinLock provides exclusive access to T
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Create a new spin lock with the default backoff thresholds
    #[inline]
    pub const fn new(value: T) -> Self {
        Self::with_backoff(value, BackoffConfig::new())
    }

    /// Create a new spin lock with explicit backoff thresholds
    #[inline]
    pub const fn with_backoff(value: T, backoff: BackoffConfig) -> Self {
        SpinLock {
            word: LockWord(AtomicU32::new(0)),
            backoff,
            data: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock, backing off until it's available
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let mut backoff = Backoff::new(self.backoff);
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }
            backoff.snooze();
        }
    }

    /// Try to acquire the lock without waiting
    #[inline]
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        // Dirty read first so waiters don't hammer the cache line.
        if self.word.0.load(Ordering::Relaxed) == 0 && test_and_set(&self.word.0).or_abort() == 0
        {
            Some(SpinLockGuard { lock: self })
        } else {
            None
        }
    }

    /// Get mutable access without locking (unsafe)
    ///
    /// # Safety
    ///
    /// Caller must ensure exclusive access to the lock.
    #[inline]
    pub unsafe fn get_mut_unchecked(&self) -> &mut T {
        &mut *self.data.get()
    }

    /// Get mutable access through an exclusive borrow
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Check if the lock is currently held
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.word.0.load(Ordering::Relaxed) != 0
    }

    /// Backoff thresholds this lock was built with
    #[inline]
    pub fn backoff(&self) -> BackoffConfig {
        self.backoff
    }

    fn unlock(&self) {
        membar();
        self.word.0.store(0, Ordering::Release);
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        SpinLock::new(T::default())
    }
}

/// Guard that releases the spin lock when dropped
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<'a, T> Deref for SpinLockGuard<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // Safety: We hold the lock
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for SpinLockGuard<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // Safety: We hold the lock
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for SpinLockGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
