//! Region: a chain of heap blocks released together
//!
//! Every block carries a small link header pointing at the block allocated
//! before it. Dropping the Region walks the chain from the newest block back
//! to the oldest, so blocks are released in reverse allocation order.

use std::alloc::{alloc, dealloc, Layout};
use std::cell::Cell;
use std::ptr::NonNull;

use crate::constants::MAX_ALIGN;
use crate::error::{CoreError, CoreResult, OrAbort};

/// Header written at the start of every block
#[repr(C, align(16))]
struct Link {
    prev: Option<NonNull<Link>>,
    size: usize,
}

const HEADER: usize = crate::align_up(std::mem::size_of::<Link>());

/// Arena of raw blocks
pub struct Region {
    head: Cell<Option<NonNull<Link>>>,
    blocks: Cell<usize>,
    bytes: Cell<usize>,
}

// Safety: a Region exclusively owns its blocks; it's just not Sync.
unsafe impl Send for Region {}

impl Region {
    pub const fn new() -> Self {
        Self {
            head: Cell::new(None),
            blocks: Cell::new(0),
            bytes: Cell::new(0),
        }
    }

    /// Allocate `n` bytes aligned to `MAX_ALIGN`.
    ///
    /// The memory is uninitialized and stays valid until the Region drops.
    pub fn try_allocate(&self, n: usize) -> CoreResult<NonNull<u8>> {
        let size = n
            .checked_add(HEADER)
            .ok_or(CoreError::OutOfMemory { bytes: n })?;
        let layout = Layout::from_size_align(size, MAX_ALIGN)
            .map_err(|_| CoreError::OutOfMemory { bytes: n })?;

        // Safety: layout has a non-zero size (HEADER > 0).
        let raw = unsafe { alloc(layout) };
        let link = NonNull::new(raw as *mut Link).ok_or(CoreError::OutOfMemory { bytes: size })?;

        // Safety: the block is fresh and large enough for a Link.
        unsafe {
            link.as_ptr().write(Link {
                prev: self.head.get(),
                size,
            });
        }
        self.head.set(Some(link));
        self.blocks.set(self.blocks.get() + 1);
        self.bytes.set(self.bytes.get() + size);

        // Safety: HEADER < size, so the payload pointer stays inside the block.
        Ok(unsafe { NonNull::new_unchecked(raw.add(HEADER)) })
    }

    /// Like [`try_allocate`](Self::try_allocate) but out of memory aborts.
    #[track_caller]
    pub fn allocate(&self, n: usize) -> NonNull<u8> {
        self.try_allocate(n).or_abort()
    }

    /// Number of live blocks
    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.get()
    }

    /// Bytes requested from the system, headers included
    #[inline]
    pub fn allocated_bytes(&self) -> usize {
        self.bytes.get()
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        let mut cur = self.head.take();
        while let Some(link) = cur {
            // Safety: every link was written by try_allocate with this layout.
            unsafe {
                let Link { prev, size } = link.as_ptr().read();
                dealloc(
                    link.as_ptr() as *mut u8,
                    Layout::from_size_align_unchecked(size, MAX_ALIGN),
                );
                cur = prev;
            }
        }
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("blocks", &self.blocks.get())
            .field("bytes", &self.bytes.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_keeps_alignment() {
        assert_eq!(HEADER % MAX_ALIGN, 0);
    }

    #[test]
    fn test_allocations_are_aligned_and_writable() {
        let region = Region::new();
        for n in [1usize, 7, 16, 100, 4096] {
            let p = region.allocate(n);
            assert_eq!(p.as_ptr() as usize % MAX_ALIGN, 0);
            unsafe { std::ptr::write_bytes(p.as_ptr(), 0xab, n) };
        }
        assert_eq!(region.block_count(), 5);
    }

    #[test]
    fn test_zero_sized_request() {
        let region = Region::new();
        let a = region.allocate(0);
        let b = region.allocate(0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_bytes_accounting() {
        let region = Region::new();
        region.allocate(64);
        assert_eq!(region.allocated_bytes(), 64 + HEADER);
    }

    #[test]
    fn test_oversized_request_is_reported() {
        let region = Region::new();
        let err = region.try_allocate(usize::MAX).unwrap_err();
        assert!(err.is_environment());
        assert_eq!(region.block_count(), 0);
    }
}
