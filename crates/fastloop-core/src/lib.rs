//! # fastloop-core
//!
//! Core primitives for the fastloop runtime.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! The pthread-backed monitor, the wall clock and the event loop live in
//! `fastloop-runtime`.
//!
//! ## Modules
//!
//! - `atomic` - Compare-and-swap, test-and-set, pause, barriers, clock ticks
//! - `alloc` - Region (arena), Bin (bump) and Pool (fixed-size) allocators
//! - `spinlock` - Spin lock with pause/yield/sleep backoff
//! - `thread` - Yield and sleep helpers used by the backoff
//! - `error` - Error taxonomy and the fail-fast `OrAbort` wrapper
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod atomic;
pub mod alloc;
pub mod spinlock;
pub mod thread;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use alloc::{Bin, Pool, PoolKey, Region};
pub use error::{CoreError, CoreResult, OrAbort};
pub use spinlock::{BackoffConfig, SpinLock, SpinLockGuard};
pub use env::{env_get, env_get_bool, env_get_nonzero, env_get_opt, env_get_str, env_is_set};

/// Constants for memory layout
pub mod constants {
    /// Largest scalar alignment on supported targets; every Region/Bin
    /// allocation is aligned to this.
    pub const MAX_ALIGN: usize = 16;

    /// Bin page size: four 4 KB pages minus the Region link header and the
    /// system allocator's own bookkeeping.
    pub const BIN_PAGE_SIZE: usize = 4 * 4096 - MAX_ALIGN - 16;

    /// Default number of blocks a Pool starts with
    pub const DEFAULT_POOL_INIT_BLOCKS: usize = 128;

    /// Default cap on how many blocks a Pool adds per growth step
    pub const DEFAULT_POOL_MAX_INCREMENT: usize = 1024;

    /// Cache line size for alignment
    pub const CACHE_LINE_SIZE: usize = 64;
}

/// Round `n` up to the platform's maximum scalar alignment.
///
/// Works only because `MAX_ALIGN` is a power of two.
#[inline]
pub const fn align_up(n: usize) -> usize {
    (n + constants::MAX_ALIGN - 1) & !(constants::MAX_ALIGN - 1)
}

/// Growth step shared by the Pool and the fast queue: double while small,
/// then grow by at most `max_increment`.
#[inline]
pub fn growth_increment(current: usize, max_increment: usize) -> usize {
    current.min(max_increment).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0), 0);
        assert_eq!(align_up(1), 16);
        assert_eq!(align_up(16), 16);
        assert_eq!(align_up(17), 32);
    }

    #[test]
    fn test_growth_increment() {
        assert_eq!(growth_increment(128, 1024), 128);
        assert_eq!(growth_increment(4096, 1024), 1024);
        assert_eq!(growth_increment(0, 1024), 1);
    }
}
