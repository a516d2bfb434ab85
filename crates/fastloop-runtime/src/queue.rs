//! Multi-producer, single-consumer batch queue
//!
//! Producers append to a write list under a [`Monitor`]. The consumer takes
//! the whole write list in one swap and works through it without holding
//! the lock. The consumer's previous batch buffers, already emptied, become
//! the new write list, so storage is recycled one drain late and a steady
//! state never allocates.
//!
//! ```text
//!   producers ──push──► [ write list ] ──get_work (swap)──► [ batch ] ──► consumer
//!                            ▲                                  │
//!                            └────────── emptied slabs ◄────────┘
//! ```
//!
//! The write list is a chain of fixed-capacity slabs. Growing it adds a
//! slab; queued items never move, so a push under the lock is O(1).
//!
//! Ordering: items pushed while a batch is being processed land in the next
//! batch; each producer's items arrive in the order it pushed them.
//!
//! The monitor can guard extra state next to the queue (the event loop keeps
//! its timers there). [`FastQueue::lock`], [`FastQueue::push_locked`] and
//! [`FastQueue::get_work_locked`] let such an owner drive the queue while
//! it holds the lock for its own reasons.

use std::mem;

use fastloop_core::constants::{DEFAULT_POOL_INIT_BLOCKS, DEFAULT_POOL_MAX_INCREMENT};
use fastloop_core::{growth_increment, kdebug, ktrace};

use crate::config::RuntimeConfig;
use crate::sync::{Monitor, MutexGuard};
use crate::time::MicroTime;

/// Producer-side storage. Always accessed under the owner's monitor.
struct WriteList<T> {
    name: &'static str,
    slabs: Vec<Vec<T>>,
    /// Slab currently being filled
    tail: usize,
    len: usize,
    capacity: usize,
    init_nodes: usize,
    max_increment: usize,
}

impl<T> WriteList<T> {
    fn new(name: &'static str, init_nodes: usize, max_increment: usize) -> Self {
        let init_nodes = if init_nodes == 0 {
            DEFAULT_POOL_INIT_BLOCKS
        } else {
            init_nodes
        };
        let max_increment = if max_increment == 0 {
            DEFAULT_POOL_MAX_INCREMENT
        } else {
            max_increment
        };
        let first = Vec::with_capacity(init_nodes);
        Self {
            name,
            capacity: first.capacity(),
            slabs: vec![first],
            tail: 0,
            len: 0,
            init_nodes,
            max_increment,
        }
    }

    /// Append `item`; true when the list was empty before.
    fn push(&mut self, item: T) -> bool {
        if self
            .slabs
            .get(self.tail)
            .is_some_and(|slab| slab.len() == slab.capacity())
        {
            self.tail += 1;
        }
        if self.tail == self.slabs.len() {
            let incr = if self.capacity == 0 {
                self.init_nodes
            } else {
                growth_increment(self.capacity, self.max_increment)
            };
            let slab = Vec::with_capacity(incr);
            self.capacity += slab.capacity();
            self.slabs.push(slab);
            kdebug!("{} capacity: {}", self.name, self.capacity);
        }
        let was_empty = self.len == 0;
        self.slabs[self.tail].push(item);
        self.len += 1;
        was_empty
    }

    /// Hand every queued item to `batch`, taking its emptied slabs in return.
    fn swap_into(&mut self, batch: &mut Batch<T>) {
        debug_assert!(batch.is_empty());
        mem::swap(&mut self.slabs, &mut batch.slabs);
        batch.len = mem::replace(&mut self.len, 0);
        self.tail = 0;
        self.capacity = self.slabs.iter().map(Vec::capacity).sum();
    }
}

/// Queue storage plus the state guarded by the same monitor
pub struct QueueState<T, S> {
    list: WriteList<T>,
    /// Owner state protected by the queue's lock
    pub shared: S,
}

impl<T, S> QueueState<T, S> {
    /// Items waiting for the consumer
    #[inline]
    pub fn len(&self) -> usize {
        self.list.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.len == 0
    }
}

/// Items drained by one [`FastQueue::get_work`] call, in push order
#[derive(Debug)]
pub struct Batch<T> {
    slabs: Vec<Vec<T>>,
    len: usize,
}

impl<T> Batch<T> {
    pub fn new() -> Self {
        Self {
            slabs: Vec::new(),
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.slabs.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.slabs.iter_mut().flatten()
    }

    /// Move the items out, leaving the slabs for reuse
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.len = 0;
        self.slabs.iter_mut().flat_map(|slab| slab.drain(..))
    }

    /// Drop every item, keeping the slabs
    pub fn clear(&mut self) {
        for slab in &mut self.slabs {
            slab.clear();
        }
        self.len = 0;
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }
}

impl<T> Default for Batch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> IntoIterator for &'a Batch<T> {
    type Item = &'a T;
    type IntoIter = std::iter::Flatten<std::slice::Iter<'a, Vec<T>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.slabs.iter().flatten()
    }
}

/// Unbounded MPSC queue
///
/// `S` is extra state kept under the queue's monitor; plain queues use `()`.
///
/// # Example
///
/// ```rust,ignore
/// let queue = Arc::new(FastQueue::new());
/// let mut batch = Batch::new();
///
/// queue.push(42u32);
/// if queue.get_work(MicroTime::now().after(10), &mut batch) {
///     for item in batch.drain() { /* ... */ }
/// }
/// ```
pub struct FastQueue<T, S = ()> {
    monitor: Monitor<QueueState<T, S>>,
}

impl<T> FastQueue<T> {
    /// Queue sized from the runtime configuration
    pub fn new() -> Self {
        Self::from_config(&RuntimeConfig::from_env())
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::with_capacity(config.queue_init_nodes, config.queue_max_increment)
    }

    /// Queue reserving `init_nodes` items, growing by at most
    /// `max_increment` at a time. Zero sizes fall back to 128 and 1024.
    pub fn with_capacity(init_nodes: usize, max_increment: usize) -> Self {
        Self::with_state("FastQueue", init_nodes, max_increment, ())
    }
}

impl<T, S> FastQueue<T, S> {
    /// Queue whose monitor also guards `shared`
    pub fn with_state(
        name: &'static str,
        init_nodes: usize,
        max_increment: usize,
        shared: S,
    ) -> Self {
        Self {
            monitor: Monitor::new(QueueState {
                list: WriteList::new(name, init_nodes, max_increment),
                shared,
            }),
        }
    }

    /// Enter the queue's monitor
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, QueueState<T, S>> {
        self.monitor.lock()
    }

    /// Wake the consumer without queueing anything
    #[inline]
    pub fn notify(&self) {
        self.monitor.notify();
    }

    #[inline]
    pub fn notify_all(&self) {
        self.monitor.notify_all();
    }

    /// Append an item; wakes the consumer if the queue was empty.
    pub fn push(&self, item: T) {
        let mut state = self.lock();
        self.push_locked(&mut state, item);
    }

    /// [`push`](Self::push) with the monitor already held
    pub fn push_locked(&self, state: &mut MutexGuard<'_, QueueState<T, S>>, item: T) {
        if state.list.push(item) {
            self.monitor.notify();
        }
    }

    /// Wait until there is work or `deadline` passes.
    ///
    /// On success the queued items replace the contents of `batch` and
    /// `true` is returned. `false` means the deadline passed with nothing
    /// queued. A deadline in the past never blocks; `MicroTime::MAX` waits
    /// indefinitely.
    pub fn get_work(&self, deadline: MicroTime, batch: &mut Batch<T>) -> bool {
        // Dropping leftovers can be expensive; do it before taking the lock.
        batch.clear();

        let mut state = self.lock();
        loop {
            if self.get_work_locked(&mut state, deadline, batch) {
                return true;
            }
            if MicroTime::now() >= deadline {
                return false;
            }
        }
    }

    /// One drain attempt with the monitor held.
    ///
    /// Takes the queued items if there are any. Otherwise waits once, until
    /// notified or `deadline`, and takes whatever arrived. `false` means
    /// nothing was queued on return; the caller re-checks its own
    /// conditions before trying again. Clear `batch` before taking the lock
    /// so leftover items are not dropped under it.
    pub fn get_work_locked(
        &self,
        state: &mut MutexGuard<'_, QueueState<T, S>>,
        deadline: MicroTime,
        batch: &mut Batch<T>,
    ) -> bool {
        batch.clear();
        if state.list.len == 0 {
            ktrace!("event queue is empty, waiting...");
            self.monitor.timed_wait(state, deadline);
            if state.list.len == 0 {
                return false;
            }
        }
        state.list.swap_into(batch);
        true
    }

    /// Items waiting for the consumer
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<T> Default for FastQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn addresses(list: &WriteList<u64>, n: usize) -> Vec<usize> {
        list.slabs
            .iter()
            .flatten()
            .take(n)
            .map(|v| v as *const u64 as usize)
            .collect()
    }

    #[test]
    fn test_write_list_reports_empty_transition() {
        let mut list = WriteList::new("test", 2, 4);
        assert!(list.push(1));
        assert!(!list.push(2));
        assert!(!list.push(3));
        assert_eq!(list.len, 3);

        let mut batch = Batch::new();
        list.swap_into(&mut batch);
        assert_eq!(batch.to_vec(), [1, 2, 3]);
        assert_eq!(list.len, 0);
        assert!(list.push(4));
    }

    #[test]
    fn test_write_list_growth_is_capped() {
        let mut list = WriteList::new("test", 4, 2);
        for i in 0..5 {
            list.push(i);
        }
        // 4 -> 4 + min(4, 2) = 6
        assert_eq!(list.capacity, 6);
        assert_eq!(list.slabs.len(), 2);
    }

    #[test]
    fn test_zero_sizes_use_defaults() {
        let list: WriteList<u8> = WriteList::new("test", 0, 0);
        assert_eq!(list.init_nodes, DEFAULT_POOL_INIT_BLOCKS);
        assert_eq!(list.max_increment, DEFAULT_POOL_MAX_INCREMENT);
        assert!(list.capacity >= DEFAULT_POOL_INIT_BLOCKS);
    }

    #[test]
    fn test_growth_never_moves_queued_items() {
        let mut list = WriteList::new("test", 8, 16);
        for i in 0..100u64 {
            list.push(i);
        }
        let before = addresses(&list, 100);
        for i in 100..5_000u64 {
            list.push(i);
        }
        assert!(list.slabs.len() > 10);
        assert_eq!(addresses(&list, 100), before);
        let values: Vec<u64> = list.slabs.iter().flatten().copied().collect();
        assert_eq!(values, (0..5_000).collect::<Vec<_>>());
    }

    #[test]
    fn test_push_then_drain() {
        let q = FastQueue::with_capacity(4, 4);
        let mut batch = Batch::new();
        for i in 0..10 {
            q.push(i);
        }
        assert_eq!(q.len(), 10);
        assert!(q.get_work(MicroTime::MAX, &mut batch));
        assert_eq!(batch.len(), 10);
        assert_eq!(batch.to_vec(), (0..10).collect::<Vec<_>>());
        assert!(q.is_empty());
    }

    #[test]
    fn test_past_deadline_returns_immediately() {
        let q: FastQueue<u32> = FastQueue::with_capacity(4, 4);
        let mut batch = Batch::new();
        let start = Instant::now();
        assert!(!q.get_work(MicroTime::MIN, &mut batch));
        assert!(start.elapsed() < Duration::from_millis(100));
        assert!(batch.is_empty());
    }

    #[test]
    fn test_timeout_after_deadline() {
        let q: FastQueue<u32> = FastQueue::with_capacity(4, 4);
        let mut batch = Batch::new();
        let start = Instant::now();
        assert!(!q.get_work(MicroTime::now().after(20), &mut batch));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_consumer_woken_by_push() {
        let q = Arc::new(FastQueue::with_capacity(4, 4));
        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                q.push(7u32);
            })
        };
        let mut batch = Batch::new();
        assert!(q.get_work(MicroTime::now().after(5_000), &mut batch));
        assert_eq!(batch.to_vec(), [7]);
        producer.join().unwrap();
    }

    #[test]
    fn test_batch_boundary() {
        let q = FastQueue::with_capacity(4, 4);
        let mut batch = Batch::new();
        q.push(1);
        assert!(q.get_work(MicroTime::MAX, &mut batch));
        q.push(2);
        assert_eq!(batch.to_vec(), [1]);
        assert!(q.get_work(MicroTime::MAX, &mut batch));
        assert_eq!(batch.to_vec(), [2]);
    }

    #[test]
    fn test_buffers_recycled() {
        let q = FastQueue::with_capacity(64, 64);
        let mut batch = Batch::new();
        q.push(1u64);
        q.get_work(MicroTime::MAX, &mut batch);
        q.push(2);
        q.get_work(MicroTime::MAX, &mut batch);
        // The first batch slab came back as write storage.
        let batch_capacity: usize = batch.slabs.iter().map(Vec::capacity).sum();
        assert_eq!(batch_capacity, 64);
        assert_eq!(q.lock().list.capacity, 64);
        assert_eq!(batch.to_vec(), [2]);
    }

    #[test]
    fn test_shared_state_under_one_lock() {
        let q: FastQueue<u32, Vec<&str>> = FastQueue::with_state("test", 4, 4, Vec::new());
        let mut batch = Batch::new();
        {
            let mut state = q.lock();
            state.shared.push("tick");
            q.push_locked(&mut state, 3);
            assert!(q.get_work_locked(&mut state, MicroTime::MIN, &mut batch));
            assert!(state.is_empty());
            assert!(!q.get_work_locked(&mut state, MicroTime::MIN, &mut batch));
        }
        assert!(batch.is_empty());
        assert_eq!(q.lock().shared, ["tick"]);
    }
}
