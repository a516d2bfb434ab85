//! Bin: bump allocation out of Region pages
//!
//! Allocations never move and are never freed one by one. Everything comes
//! back when the Bin drops. Values placed with [`Bin::alloc_value`] are not
//! dropped; use it for plain data that lives as long as the Bin.

use std::cell::Cell;
use std::ptr::{self, NonNull};

use crate::align_up;
use crate::alloc::Region;
use crate::constants::{BIN_PAGE_SIZE, MAX_ALIGN};
use crate::error::{CoreError, CoreResult, OrAbort};

pub struct Bin {
    region: Region,
    current: Cell<usize>,
    end: Cell<usize>,
}

impl Bin {
    pub const fn new() -> Self {
        Self {
            region: Region::new(),
            current: Cell::new(0),
            end: Cell::new(0),
        }
    }

    pub fn try_allocate(&self, n: usize, zero: bool) -> CoreResult<NonNull<u8>> {
        if n > isize::MAX as usize {
            return Err(CoreError::OutOfMemory { bytes: n });
        }
        let n = align_up(n.max(1));
        let p = if n > BIN_PAGE_SIZE {
            // Dedicated block; the current page keeps its cursor.
            self.region.try_allocate(n)?
        } else {
            if self.end.get() - self.current.get() < n {
                let page = self.region.try_allocate(BIN_PAGE_SIZE)?;
                let start = page.as_ptr() as usize;
                self.current.set(start);
                self.end.set(start + BIN_PAGE_SIZE);
            }
            let start = self.current.get();
            self.current.set(start + n);
            // Safety: start lies inside a live page.
            unsafe { NonNull::new_unchecked(start as *mut u8) }
        };
        if zero {
            // Safety: p points at n writable bytes.
            unsafe { ptr::write_bytes(p.as_ptr(), 0, n) };
        }
        Ok(p)
    }

    /// Allocate `n` bytes rounded up to `MAX_ALIGN`, optionally zeroed.
    #[track_caller]
    pub fn allocate(&self, n: usize, zero: bool) -> NonNull<u8> {
        self.try_allocate(n, zero).or_abort()
    }

    /// Copy `s` into Bin memory. A trailing NUL is stored after the text.
    pub fn duplicate_str(&self, s: &str) -> &str {
        let len = s.len();
        let p = self.allocate(len + 1, false);
        // Safety: p has len + 1 bytes and nothing else refers to them.
        unsafe {
            ptr::copy_nonoverlapping(s.as_ptr(), p.as_ptr(), len);
            *p.as_ptr().add(len) = 0;
            std::str::from_utf8_unchecked(std::slice::from_raw_parts(p.as_ptr(), len))
        }
    }

    /// Move `value` into Bin memory and hand back a reference to it.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_value<T>(&self, value: T) -> &mut T {
        if std::mem::align_of::<T>() > MAX_ALIGN {
            crate::error::abort_with(&CoreError::Contract("Bin value over-aligned"));
        }
        let p = self.allocate(std::mem::size_of::<T>(), false).cast::<T>();
        // Safety: p is aligned for T, sized for T and unaliased.
        unsafe {
            p.as_ptr().write(value);
            &mut *p.as_ptr()
        }
    }

    /// Bytes left in the current page
    #[inline]
    pub fn remaining(&self) -> usize {
        self.end.get() - self.current.get()
    }

    /// Blocks taken from the backing Region
    #[inline]
    pub fn block_count(&self) -> usize {
        self.region.block_count()
    }
}

impl Default for Bin {
    fn default() -> Self {
        Self::new()
    }
}
