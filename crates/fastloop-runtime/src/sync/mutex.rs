//! pthread mutex with an RAII guard

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use fastloop_core::error::{abort_with, CoreError, CoreResult, OrAbort};

/// Mutual exclusion over a `T` backed by `pthread_mutex_t`
///
/// The pthread object is boxed so it never moves after initialization.
pub struct Mutex<T> {
    raw: Box<UnsafeCell<libc::pthread_mutex_t>>,
    data: UnsafeCell<T>,
}

// Safety: access to data is serialized by the pthread mutex.
unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    pub fn try_new(value: T) -> CoreResult<Self> {
        let raw = Box::new(UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER));
        // Safety: raw points at writable, pinned storage.
        let rc = unsafe { libc::pthread_mutex_init(raw.get(), std::ptr::null()) };
        if rc != 0 {
            return Err(CoreError::os("pthread_mutex_init", rc));
        }
        Ok(Self {
            raw,
            data: UnsafeCell::new(value),
        })
    }

    /// Create a mutex; an init failure aborts.
    #[track_caller]
    pub fn new(value: T) -> Self {
        Self::try_new(value).or_abort()
    }

    /// Lock, reporting a pthread failure instead of aborting
    pub fn lock_checked(&self) -> CoreResult<MutexGuard<'_, T>> {
        // Safety: raw was initialized in try_new.
        let rc = unsafe { libc::pthread_mutex_lock(self.raw.get()) };
        if rc != 0 {
            return Err(CoreError::os("pthread_mutex_lock", rc));
        }
        Ok(MutexGuard {
            mutex: self,
            _not_send: PhantomData,
        })
    }

    /// Block until the mutex is held
    #[track_caller]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.lock_checked().or_abort()
    }

    /// Take the mutex only if it is free right now
    #[track_caller]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        // Safety: raw was initialized in try_new.
        match unsafe { libc::pthread_mutex_trylock(self.raw.get()) } {
            0 => Some(MutexGuard {
                mutex: self,
                _not_send: PhantomData,
            }),
            libc::EBUSY => None,
            rc => abort_with(&CoreError::os("pthread_mutex_trylock", rc)),
        }
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    #[inline]
    pub(crate) fn raw(&self) -> *mut libc::pthread_mutex_t {
        self.raw.get()
    }
}

impl<T> Drop for Mutex<T> {
    fn drop(&mut self) {
        // Safety: no guard can outlive the borrow of self, so it is unlocked.
        let rc = unsafe { libc::pthread_mutex_destroy(self.raw.get()) };
        if rc != 0 {
            abort_with(&CoreError::os("pthread_mutex_destroy", rc));
        }
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Mutex::new(T::default())
    }
}

/// Holds the mutex until dropped
pub struct MutexGuard<'a, T> {
    pub(crate) mutex: &'a Mutex<T>,
    // pthread requires the locking thread to unlock.
    _not_send: PhantomData<*const ()>,
}

impl<'a, T> Deref for MutexGuard<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // Safety: We hold the lock
        unsafe { &*self.mutex.data.get() }
    }
}

impl<'a, T> DerefMut for MutexGuard<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // Safety: We hold the lock
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<'a, T> Drop for MutexGuard<'a, T> {
    fn drop(&mut self) {
        // Safety: this guard owns the lock.
        let rc = unsafe { libc::pthread_mutex_unlock(self.mutex.raw()) };
        if rc != 0 {
            abort_with(&CoreError::os("pthread_mutex_unlock", rc));
        }
    }
}
