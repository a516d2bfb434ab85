//! Atomic primitives and memory barriers
//!
//! Thin, named operations over `core::sync::atomic` so the rest of the crate
//! reads in terms of CAS, test-and-set and fences rather than orderings.
//!
//! - `compare_and_swap` is a strong CAS: it never fails spuriously.
//! - `test_and_set` is for binary words only (0 = clear, 1 = set).
//! - `membar` / `rmembar` / `wmembar` map to SeqCst / Acquire / Release
//!   fences; `barrier` only stops the compiler from reordering.
//! - `clock_ticks` is a free-running cycle counter for coarse profiling.
//!   Never use it for anything correctness-bearing.

use core::sync::atomic::{compiler_fence, fence, AtomicU32, AtomicUsize, Ordering};

use crate::error::{CoreError, CoreResult};

/// Word types that support a strong compare-and-swap.
pub trait CasWord {
    /// Plain value stored in the word
    type Value: Copy + Eq;

    /// Strong CAS; returns the value observed before the operation.
    fn cas(&self, expected: Self::Value, new: Self::Value) -> Self::Value;
}

impl CasWord for AtomicU32 {
    type Value = u32;

    #[inline]
    fn cas(&self, expected: u32, new: u32) -> u32 {
        match self.compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire) {
            Ok(prev) | Err(prev) => prev,
        }
    }
}

impl CasWord for AtomicUsize {
    type Value = usize;

    #[inline]
    fn cas(&self, expected: usize, new: usize) -> usize {
        match self.compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire) {
            Ok(prev) | Err(prev) => prev,
        }
    }
}

/// Atomically store `new` if `*word == expected`.
///
/// Returns the previous value in both cases; the swap happened iff the
/// return value equals `expected`.
#[inline]
pub fn compare_and_swap<W: CasWord>(word: &W, expected: W::Value, new: W::Value) -> W::Value {
    word.cas(expected, new)
}

/// Atomically store 1 and return the old value.
///
/// An old value outside {0, 1} means someone used the word for something
/// other than a binary flag.
#[inline]
pub fn test_and_set(word: &AtomicU32) -> CoreResult<u32> {
    let prev = word.swap(1, Ordering::Acquire);
    if prev > 1 {
        return Err(CoreError::Contract("test_and_set on a non-binary word"));
    }
    Ok(prev)
}

/// Pipeline pause hint, one iteration
#[inline(always)]
pub fn cpu_pause() {
    core::hint::spin_loop();
}

/// Pipeline pause hint repeated `n` times
#[inline]
pub fn cpu_pause_n(n: u32) {
    for _ in 0..n {
        core::hint::spin_loop();
    }
}

/// Compiler-only barrier
#[inline(always)]
pub fn barrier() {
    compiler_fence(Ordering::SeqCst);
}

/// Full memory barrier
#[inline(always)]
pub fn membar() {
    fence(Ordering::SeqCst);
}

/// Read barrier: later loads are not hoisted above earlier ones
#[inline(always)]
pub fn rmembar() {
    fence(Ordering::Acquire);
}

/// Write barrier: earlier stores are visible before later ones
#[inline(always)]
pub fn wmembar() {
    fence(Ordering::Release);
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        /// Free-running hardware cycle counter
        #[inline]
        pub fn clock_ticks() -> u64 {
            // Safety: rdtsc has no preconditions on x86_64.
            unsafe { core::arch::x86_64::_rdtsc() }
        }
    } else if #[cfg(target_arch = "aarch64")] {
        /// Free-running hardware cycle counter
        #[inline]
        pub fn clock_ticks() -> u64 {
            let ticks: u64;
            // Safety: cntvct_el0 is readable from EL0 on every aarch64 OS we target.
            unsafe { core::arch::asm!("mrs {}, cntvct_el0", out(reg) ticks) };
            ticks
        }
    } else {
        /// Nanoseconds since first use; no portable cycle counter here
        pub fn clock_ticks() -> u64 {
            use std::sync::OnceLock;
            use std::time::Instant;
            static START: OnceLock<Instant> = OnceLock::new();
            START.get_or_init(Instant::now).elapsed().as_nanos() as u64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_cas_success_and_failure() {
        let word = AtomicU32::new(5);
        assert_eq!(compare_and_swap(&word, 5, 9), 5);
        assert_eq!(word.load(Ordering::Relaxed), 9);

        // Mismatch leaves memory untouched and reports the real value.
        assert_eq!(compare_and_swap(&word, 5, 1), 9);
        assert_eq!(word.load(Ordering::Relaxed), 9);
    }

    #[test]
    fn test_cas_usize() {
        let word = AtomicUsize::new(0);
        assert_eq!(compare_and_swap(&word, 0, usize::MAX), 0);
        assert_eq!(word.load(Ordering::Relaxed), usize::MAX);
    }

    #[test]
    fn test_cas_counter_concurrent() {
        let word = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let word = Arc::clone(&word);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let mut cur = word.load(Ordering::Relaxed);
                        loop {
                            let seen = compare_and_swap(&*word, cur, cur + 1);
                            if seen == cur {
                                break;
                            }
                            cur = seen;
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(word.load(Ordering::Relaxed), 4000);
    }

    #[test]
    fn test_test_and_set_binary() {
        let word = AtomicU32::new(0);
        assert_eq!(test_and_set(&word), Ok(0));
        assert_eq!(test_and_set(&word), Ok(1));
    }

    #[test]
    fn test_test_and_set_rejects_non_binary() {
        let word = AtomicU32::new(7);
        let err = test_and_set(&word).unwrap_err();
        assert!(err.is_contract());
    }

    #[test]
    fn test_clock_ticks_advance() {
        let a = clock_ticks();
        cpu_pause_n(1000);
        let b = clock_ticks();
        assert!(b >= a);
    }

    #[test]
    fn test_barriers_are_callable() {
        barrier();
        membar();
        rmembar();
        wmembar();
        cpu_pause();
    }
}
