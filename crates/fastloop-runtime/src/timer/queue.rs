//! Sorted timer queue
//!
//! A circular doubly-linked list threaded through pool slots. The sentinel
//! is both head and tail: an empty queue is one whose sentinel points at
//! itself. Insertion scans backward from the tail, so the common case of a
//! deadline later than everything queued is O(1) and equal deadlines keep
//! arrival order.
//!
//! Not synchronized. The event loop only touches it under its monitor.

use fastloop_core::constants::{DEFAULT_POOL_INIT_BLOCKS, DEFAULT_POOL_MAX_INCREMENT};
use fastloop_core::error::{abort_with, CoreError};
use fastloop_core::{Pool, PoolKey};

use super::Timer;
use crate::time::MicroTime;

/// Position in the ring: the sentinel or a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Sentinel,
    Node(PoolKey),
}

struct Node {
    timer: Timer,
    prev: Cursor,
    next: Cursor,
}

/// Timers in ascending deadline order
pub struct TimerQueue {
    nodes: Pool<Node>,
    /// sentinel.next
    first: Cursor,
    /// sentinel.prev
    last: Cursor,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_INIT_BLOCKS, DEFAULT_POOL_MAX_INCREMENT)
    }

    /// Queue whose node pool starts at `init_blocks` and grows by at most
    /// `max_increment` slots at a time
    pub fn with_capacity(init_blocks: usize, max_increment: usize) -> Self {
        Self {
            nodes: Pool::with_capacity("TimerQueue", init_blocks, max_increment),
            first: Cursor::Sentinel,
            last: Cursor::Sentinel,
        }
    }

    fn node(&self, key: PoolKey) -> &Node {
        match self.nodes.get(key) {
            Some(node) => node,
            None => abort_with(&CoreError::Contract("timer queue linked to a free slot")),
        }
    }

    fn node_mut(&mut self, key: PoolKey) -> &mut Node {
        match self.nodes.get_mut(key) {
            Some(node) => node,
            None => abort_with(&CoreError::Contract("timer queue linked to a free slot")),
        }
    }

    fn next_of(&self, at: Cursor) -> Cursor {
        match at {
            Cursor::Sentinel => self.first,
            Cursor::Node(k) => self.node(k).next,
        }
    }

    fn set_next(&mut self, at: Cursor, to: Cursor) {
        match at {
            Cursor::Sentinel => self.first = to,
            Cursor::Node(k) => self.node_mut(k).next = to,
        }
    }

    fn set_prev(&mut self, at: Cursor, to: Cursor) {
        match at {
            Cursor::Sentinel => self.last = to,
            Cursor::Node(k) => self.node_mut(k).prev = to,
        }
    }

    /// Insert `timer` after every queued timer with the same or an earlier
    /// deadline
    pub fn add(&mut self, timer: Timer) {
        let time = timer.time;

        let mut after = self.last;
        while let Cursor::Node(k) = after {
            let node = self.node(k);
            if node.timer.time <= time {
                break;
            }
            after = node.prev;
        }
        let before = self.next_of(after);

        let key = self.nodes.allocate(Node {
            timer,
            prev: after,
            next: before,
        });
        self.set_next(after, Cursor::Node(key));
        self.set_prev(before, Cursor::Node(key));
    }

    /// Earliest deadline, or `MicroTime::MAX` when empty
    pub fn min_time(&self) -> MicroTime {
        match self.first {
            Cursor::Sentinel => MicroTime::MAX,
            Cursor::Node(k) => self.node(k).timer.time,
        }
    }

    /// Unlink and return the earliest timer if it is due at `now`
    pub fn pop_due(&mut self, now: MicroTime) -> Option<Timer> {
        let Cursor::Node(key) = self.first else {
            return None;
        };
        let node = self.node(key);
        if node.timer.time > now {
            return None;
        }
        let next = node.next;
        self.first = next;
        self.set_prev(next, Cursor::Sentinel);
        self.nodes.deallocate(key).map(|node| node.timer)
    }

    /// Fire every timer due at `now`, earliest first. Recurring timers are
    /// re-inserted and may fire again within the same call if they are
    /// still behind `now`. Returns the number of callbacks run.
    pub fn dispatch(&mut self, now: MicroTime) -> usize {
        let mut fired = 0;
        while let Some(mut timer) = self.pop_due(now) {
            let action = timer.fire();
            fired += 1;
            if timer.reschedule(action) {
                self.add(timer);
            }
        }
        fired
    }

    /// Deadlines in dispatch order
    pub fn deadlines(&self) -> Vec<MicroTime> {
        let mut out = Vec::with_capacity(self.len());
        let mut at = self.first;
        while let Cursor::Node(k) = at {
            let node = self.node(k);
            out.push(node.timer.time);
            at = node.next;
        }
        out
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.first == Cursor::Sentinel
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerQueue")
            .field("len", &self.len())
            .field("min_time", &self.min_time())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{FiredTimer, TimerAction};
    use std::sync::{Arc, Mutex};

    fn t(us: u64) -> MicroTime {
        MicroTime::from_micros(us)
    }

    fn recorder() -> Arc<Mutex<Vec<u32>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn tagged(time: MicroTime, tag: u32, log: &Arc<Mutex<Vec<u32>>>) -> Timer {
        let log = Arc::clone(log);
        Timer::once(time, move |_| log.lock().unwrap().push(tag))
    }

    #[test]
    fn test_empty() {
        let mut q = TimerQueue::new();
        assert!(q.is_empty());
        assert!(q.min_time().is_max());
        assert!(q.pop_due(MicroTime::MAX).is_none());
        assert_eq!(q.dispatch(MicroTime::MAX), 0);
    }

    #[test]
    fn test_sorted_insert() {
        let log = recorder();
        let mut q = TimerQueue::new();
        for (time, tag) in [(30, 3), (10, 1), (40, 4), (20, 2)] {
            q.add(tagged(t(time), tag, &log));
        }
        assert_eq!(q.deadlines(), vec![t(10), t(20), t(30), t(40)]);
        assert_eq!(q.min_time(), t(10));

        assert_eq!(q.dispatch(t(25)), 2);
        assert_eq!(*log.lock().unwrap(), vec![1, 2]);
        assert_eq!(q.min_time(), t(30));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_equal_deadlines_keep_arrival_order() {
        let log = recorder();
        let mut q = TimerQueue::new();
        q.add(tagged(t(50), 1, &log));
        q.add(tagged(t(10), 0, &log));
        q.add(tagged(t(50), 2, &log));
        q.add(tagged(t(50), 3, &log));
        q.add(tagged(t(60), 4, &log));

        q.dispatch(t(100));
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_pop_due_respects_now() {
        let log = recorder();
        let mut q = TimerQueue::new();
        q.add(tagged(t(10), 1, &log));
        assert!(q.pop_due(t(9)).is_none());
        let timer = q.pop_due(t(10)).unwrap();
        assert_eq!(timer.time, t(10));
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn test_recurring_fires_once_per_period() {
        // t0 = 1s, k = 100ms, now = t0 + 350ms -> floor(350/100) + 1 = 4
        let t0 = t(1_000_000);
        let times = Arc::new(Mutex::new(Vec::new()));
        let mut q = TimerQueue::new();
        {
            let times = Arc::clone(&times);
            q.add(Timer::every(t0, 100, move |fired: &FiredTimer| {
                times.lock().unwrap().push(fired.time);
                TimerAction::Recurring
            }));
        }

        assert_eq!(q.dispatch(t0.after(350)), 4);
        let expect: Vec<_> = (0..4).map(|i| t0.after(i * 100)).collect();
        assert_eq!(*times.lock().unwrap(), expect);
        assert_eq!(q.min_time(), t0.after(400));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_recurring_until_done() {
        let mut q = TimerQueue::new();
        let mut left = 3;
        q.add(Timer::every(t(0), 1, move |_| {
            left -= 1;
            TimerAction::from(left == 0)
        }));
        assert_eq!(q.dispatch(t(1_000_000)), 3);
        assert!(q.is_empty());
    }

    #[test]
    fn test_many_timers_grow_pool() {
        let log = recorder();
        let mut q = TimerQueue::with_capacity(2, 4);
        for i in (0..50u32).rev() {
            q.add(tagged(t(u64::from(i)), i, &log));
        }
        assert_eq!(q.len(), 50);
        assert_eq!(q.dispatch(t(1000)), 50);
        assert_eq!(*log.lock().unwrap(), (0..50).collect::<Vec<_>>());
    }
}
