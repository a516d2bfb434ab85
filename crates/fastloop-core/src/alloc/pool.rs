//! Fixed-size pool with generation-checked keys
//!
//! Slots live in slabs taken from a [`Region`], so a slot never moves once
//! created. A slab of `min(capacity, max_increment)` slots is added whenever
//! the free stack runs dry; the pool never shrinks.
//!
//! Each slot carries a generation that is bumped on every deallocation. A
//! [`PoolKey`] names a slot index, the generation it was issued under and
//! the pool that issued it, so a stale or foreign key is rejected instead of
//! corrupting the free stack.

use std::mem::{self, MaybeUninit};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::alloc::Region;
use crate::constants::{DEFAULT_POOL_INIT_BLOCKS, DEFAULT_POOL_MAX_INCREMENT, MAX_ALIGN};
use crate::error::{CoreError, CoreResult, OrAbort};
use crate::{growth_increment, kdebug, kwarn};

static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(1);

/// Handle to a live pool slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolKey {
    index: u32,
    generation: u32,
    pool: u32,
}

impl PoolKey {
    /// Slot index inside the issuing pool
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

struct Slot<T> {
    generation: u32,
    occupied: bool,
    value: MaybeUninit<T>,
}

/// Pool of `T` slots
pub struct Pool<T> {
    name: &'static str,
    id: u32,
    region: Region,
    slots: Vec<NonNull<Slot<T>>>,
    /// LIFO stack of free slot indices
    free: Vec<u32>,
    max_increment: usize,
}

// Safety: the pool exclusively owns its slots and their values.
unsafe impl<T: Send> Send for Pool<T> {}

impl<T> Pool<T> {
    /// Pool with the default sizes (128 slots, growth capped at 1024)
    pub fn new(name: &'static str) -> Self {
        Self::with_capacity(name, DEFAULT_POOL_INIT_BLOCKS, DEFAULT_POOL_MAX_INCREMENT)
    }

    /// Pool pre-grown to `init_blocks` slots; zero arguments take the defaults.
    #[track_caller]
    pub fn with_capacity(name: &'static str, init_blocks: usize, max_increment: usize) -> Self {
        Self::try_with_capacity(name, init_blocks, max_increment).or_abort()
    }

    pub fn try_with_capacity(
        name: &'static str,
        init_blocks: usize,
        max_increment: usize,
    ) -> CoreResult<Self> {
        if mem::align_of::<Slot<T>>() > MAX_ALIGN {
            return Err(CoreError::Contract("pool value over-aligned"));
        }
        let init_blocks = if init_blocks == 0 {
            DEFAULT_POOL_INIT_BLOCKS
        } else {
            init_blocks
        };
        let max_increment = if max_increment == 0 {
            DEFAULT_POOL_MAX_INCREMENT
        } else {
            max_increment
        };

        let mut pool = Self {
            name,
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            region: Region::new(),
            slots: Vec::new(),
            free: Vec::new(),
            max_increment,
        };
        pool.grow(init_blocks)?;
        Ok(pool)
    }

    fn grow(&mut self, count: usize) -> CoreResult<()> {
        let base = self.slots.len();
        if base + count > u32::MAX as usize {
            return Err(CoreError::OutOfMemory {
                bytes: count.saturating_mul(mem::size_of::<Slot<T>>()),
            });
        }
        let bytes = count
            .checked_mul(mem::size_of::<Slot<T>>())
            .ok_or(CoreError::OutOfMemory { bytes: usize::MAX })?;
        let slab = self.region.try_allocate(bytes)?.cast::<Slot<T>>();

        self.slots.reserve(count);
        self.free.reserve(count);
        for i in 0..count {
            // Safety: slab holds `count` slots and Slot<T> fits MAX_ALIGN.
            let slot = unsafe {
                let p = slab.as_ptr().add(i);
                p.write(Slot {
                    generation: 0,
                    occupied: false,
                    value: MaybeUninit::uninit(),
                });
                NonNull::new_unchecked(p)
            };
            self.slots.push(slot);
        }
        // Lowest index on top so a fresh slab is handed out in order.
        self.free.extend((base as u32..(base + count) as u32).rev());

        kdebug!("{} capacity: {}", self.name, self.slots.len());
        Ok(())
    }

    /// Store `value` in a free slot, growing first if none are left.
    pub fn try_allocate(&mut self, value: T) -> CoreResult<PoolKey> {
        if self.free.is_empty() {
            let incr = growth_increment(self.slots.len(), self.max_increment);
            self.grow(incr)?;
        }
        let index = self
            .free
            .pop()
            .ok_or(CoreError::Contract("pool free stack empty after growth"))?;

        // Safety: index came from the free stack, so it is in range.
        let slot = unsafe { &mut *self.slots[index as usize].as_ptr() };
        slot.value.write(value);
        slot.occupied = true;

        Ok(PoolKey {
            index,
            generation: slot.generation,
            pool: self.id,
        })
    }

    #[track_caller]
    pub fn allocate(&mut self, value: T) -> PoolKey {
        self.try_allocate(value).or_abort()
    }

    fn live_slot(&self, key: PoolKey) -> Option<NonNull<Slot<T>>> {
        if key.pool != self.id {
            return None;
        }
        let slot = *self.slots.get(key.index as usize)?;
        // Safety: slots stay valid for the pool's lifetime.
        let s = unsafe { slot.as_ref() };
        (s.occupied && s.generation == key.generation).then_some(slot)
    }

    /// Borrow the value behind a live key
    pub fn get(&self, key: PoolKey) -> Option<&T> {
        // Safety: live slots hold an initialized value.
        self.live_slot(key)
            .map(|slot| unsafe { (*slot.as_ptr()).value.assume_init_ref() })
    }

    pub fn get_mut(&mut self, key: PoolKey) -> Option<&mut T> {
        // Safety: live slots hold an initialized value; &mut self is exclusive.
        self.live_slot(key)
            .map(|slot| unsafe { (*slot.as_ptr()).value.assume_init_mut() })
    }

    /// Whether `key` still names a live slot of this pool
    #[inline]
    pub fn contains(&self, key: PoolKey) -> bool {
        self.live_slot(key).is_some()
    }

    /// Move the value out and push the slot back on the free stack.
    ///
    /// Returns `None` for a key that is stale or was issued by another pool.
    pub fn deallocate(&mut self, key: PoolKey) -> Option<T> {
        let Some(slot) = self.live_slot(key) else {
            kwarn!("{}: rejected stale or foreign key {:?}", self.name, key);
            return None;
        };
        // Safety: slot is live, so the value is initialized.
        let value = unsafe {
            let s = &mut *slot.as_ptr();
            s.occupied = false;
            s.generation = s.generation.wrapping_add(1);
            s.value.assume_init_read()
        };
        self.free.push(key.index);
        Some(value)
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Total slots, free or in use
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots currently in use
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for Pool<T> {
    fn drop(&mut self) {
        if !mem::needs_drop::<T>() {
            return;
        }
        for slot in &self.slots {
            // Safety: occupied slots hold an initialized value.
            unsafe {
                let s = &mut *slot.as_ptr();
                if s.occupied {
                    s.value.assume_init_drop();
                }
            }
        }
    }
}

impl<T> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.name)
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}
