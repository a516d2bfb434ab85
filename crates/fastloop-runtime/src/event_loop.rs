//! Single-consumer event loop
//!
//! One thread runs [`EventLoop::run`]. Any thread may [`push`](EventLoop::push)
//! events or [`add_timer`](EventLoop::add_timer) timers. Events travel
//! through a [`FastQueue`] whose monitor also guards the [`TimerQueue`].
//! Each iteration first waits on that queue, until an event arrives, a
//! timer is added, the loop is stopped or the earliest deadline passes. It
//! then does exactly one of:
//!
//! - fire every timer that is due, if the earliest deadline has passed
//! - call the handler of each event in the drained batch, in order
//!
//! The `begin`/`end` hooks bracket that dispatch step.
//!
//! Timer callbacks and event handlers run without the monitor held, so they
//! may push events and add timers themselves.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use fastloop_core::error::{CoreError, CoreResult};
use fastloop_core::kdebug;

use crate::config::RuntimeConfig;
use crate::queue::{Batch, FastQueue};
use crate::time::MicroTime;
use crate::timer::{Timer, TimerAction, TimerQueue};

/// Receives dispatched events
///
/// Called on the loop thread; a handler that blocks stalls all dispatch.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &Event);
}

impl<F> EventHandler for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn on_event(&self, event: &Event) {
        self(event)
    }
}

/// Opaque payload shared between producer and handler
pub type Payload = Arc<dyn Any + Send + Sync>;

/// A unit of work for the loop
#[derive(Clone)]
pub struct Event {
    /// Application-defined type tag
    pub kind: i32,
    /// Application-defined length, usually of the payload
    pub len: usize,
    pub payload: Option<Payload>,
    handler: Arc<dyn EventHandler>,
}

impl Event {
    pub fn new(kind: i32, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            kind,
            len: 0,
            payload: None,
            handler,
        }
    }

    pub fn with_payload(mut self, payload: Payload, len: usize) -> Self {
        self.payload = Some(payload);
        self.len = len;
        self
    }

    /// Borrow the payload as a `T`, if it is one
    pub fn payload_as<T: Any>(&self) -> Option<&T> {
        self.payload.as_deref()?.downcast_ref::<T>()
    }

    pub fn handler(&self) -> &Arc<dyn EventHandler> {
        &self.handler
    }

    /// Invoke the handler with this event
    #[inline]
    pub fn dispatch(&self) {
        self.handler.on_event(self);
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("len", &self.len)
            .field("payload", &self.payload.is_some())
            .finish_non_exhaustive()
    }
}

/// Per-iteration extension points
pub trait LoopHooks {
    /// Work is in hand and about to be dispatched
    fn begin(&mut self) {}
    /// Dispatch finished, whichever branch ran
    fn end(&mut self) {}
}

impl LoopHooks for () {}

/// What one wait on the queue produced
enum Work {
    /// The earliest timer is due as of this time
    Timers(MicroTime),
    /// The batch holds events
    Events,
}

/// Clears the consumer flag when a run ends, however it ends
struct ConsumerSlot<'a>(&'a AtomicBool);

impl Drop for ConsumerSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Timers plus an MPSC event queue, drained by one thread
pub struct EventLoop {
    events: FastQueue<Event, TimerQueue>,
    running: Arc<AtomicBool>,
    /// Bumped per run so a stale stop timer can't end a later run
    epoch: Arc<AtomicU64>,
    consuming: AtomicBool,
}

impl EventLoop {
    /// Loop sized from `RuntimeConfig::from_env()`
    pub fn new() -> Self {
        Self::with_config(&RuntimeConfig::from_env())
    }

    pub fn with_config(config: &RuntimeConfig) -> Self {
        Self {
            events: FastQueue::with_state(
                "EventQueue",
                config.queue_init_nodes,
                config.queue_max_increment,
                TimerQueue::with_capacity(config.pool_init_blocks, config.pool_max_increment),
            ),
            running: Arc::new(AtomicBool::new(false)),
            epoch: Arc::new(AtomicU64::new(0)),
            consuming: AtomicBool::new(false),
        }
    }

    /// Queue an event; wakes the loop if nothing was pending.
    pub fn push(&self, event: Event) {
        self.events.push(event);
    }

    /// Schedule a timer. Wakes the loop when it becomes the earliest one.
    pub fn add_timer(&self, timer: Timer) {
        let mut state = self.events.lock();
        let earliest = timer.time < state.shared.min_time();
        state.shared.add(timer);
        if earliest {
            self.events.notify();
        }
    }

    /// Number of timers waiting to fire
    pub fn timer_count(&self) -> usize {
        self.events.lock().shared.len()
    }

    /// Events queued but not yet taken by the loop
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Set the running flag. Clearing it stops the loop at the next
    /// iteration boundary.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
        if !running {
            // Take the lock so a consumer about to wait sees the flag.
            let _state = self.events.lock();
            self.events.notify_all();
        }
    }

    /// Ask the loop to return after its current iteration
    pub fn stop(&self) {
        self.set_running(false);
    }

    /// Run until stopped. With `millis > 0` the loop also stops by itself
    /// after that many milliseconds.
    pub fn run(&self, millis: u64) -> CoreResult<()> {
        self.run_with_hooks(millis, &mut ())
    }

    /// [`run`](Self::run) with `begin`/`end` called around every iteration.
    ///
    /// Only one thread may run a loop at a time; a second concurrent caller
    /// gets a contract error.
    pub fn run_with_hooks<H: LoopHooks>(&self, millis: u64, hooks: &mut H) -> CoreResult<()> {
        if self.consuming.swap(true, Ordering::AcqRel) {
            return Err(CoreError::Contract("event loop already has a consumer"));
        }
        let _slot = ConsumerSlot(&self.consuming);

        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        self.running.store(true, Ordering::Release);
        if millis > 0 {
            self.add_stop_timer(millis, epoch);
        }
        kdebug!("event loop started, limit {} ms", millis);

        let mut batch = Batch::new();
        let mut iterations = 0u64;
        while self.is_running() {
            let Some(work) = self.get_work(&mut batch) else {
                break;
            };
            hooks.begin();
            match work {
                Work::Timers(now) => {
                    self.dispatch_timers(now);
                }
                Work::Events => {
                    for event in &batch {
                        event.dispatch();
                    }
                }
            }
            hooks.end();
            iterations += 1;
        }

        kdebug!("event loop stopped after {} iterations", iterations);
        Ok(())
    }

    fn add_stop_timer(&self, millis: u64, epoch: u64) {
        let running = Arc::clone(&self.running);
        let current = Arc::clone(&self.epoch);
        self.add_timer(Timer::once(MicroTime::now().after(millis), move |_| {
            if current.load(Ordering::Acquire) == epoch {
                running.store(false, Ordering::Release);
            }
        }));
    }

    /// Wait for due timers or events. `None` once stopped with nothing queued.
    fn get_work(&self, batch: &mut Batch<Event>) -> Option<Work> {
        // Drop the previous batch outside the lock.
        batch.clear();

        let mut state = self.events.lock();
        loop {
            let now = MicroTime::now();
            let deadline = state.shared.min_time();
            if now >= deadline {
                return Some(Work::Timers(now));
            }
            if !self.is_running() && state.is_empty() {
                return None;
            }
            if self.events.get_work_locked(&mut state, deadline, batch) {
                return Some(Work::Events);
            }
        }
    }

    /// Fire due timers one at a time, without the lock held during callbacks
    fn dispatch_timers(&self, now: MicroTime) -> usize {
        let mut fired = 0;
        loop {
            let due = self.events.lock().shared.pop_due(now);
            let Some(mut timer) = due else {
                return fired;
            };
            let action: TimerAction = timer.fire();
            fired += 1;
            if timer.reschedule(action) {
                self.events.lock().shared.add(timer);
            }
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::{Duration, Instant};

    fn counter_handler(count: &Arc<AtomicUsize>) -> Arc<dyn EventHandler> {
        let count = Arc::clone(count);
        Arc::new(move |_: &Event| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_bounded_run_returns() {
        let el = EventLoop::new();
        let start = Instant::now();
        el.run(30).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(25));
        assert!(!el.is_running());
        assert_eq!(el.timer_count(), 0);
    }

    #[test]
    fn test_events_dispatched_in_order() {
        let el = EventLoop::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let handler: Arc<dyn EventHandler> = {
            let seen = Arc::clone(&seen);
            Arc::new(move |ev: &Event| seen.lock().unwrap().push(ev.kind))
        };
        for kind in 0..5 {
            el.push(Event::new(kind, Arc::clone(&handler)));
        }
        el.run(20).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_stop_from_other_thread() {
        let el = Arc::new(EventLoop::new());
        let stopper = {
            let el = Arc::clone(&el);
            thread::spawn(move || {
                while !el.is_running() {
                    thread::yield_now();
                }
                thread::sleep(Duration::from_millis(10));
                el.stop();
            })
        };
        let start = Instant::now();
        el.run(0).unwrap();
        stopper.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_second_consumer_rejected() {
        let el = Arc::new(EventLoop::new());
        let runner = {
            let el = Arc::clone(&el);
            thread::spawn(move || el.run(0))
        };
        while !el.is_running() {
            thread::yield_now();
        }
        let err = el.run(1).unwrap_err();
        assert!(err.is_contract());
        el.stop();
        runner.join().unwrap().unwrap();
    }

    #[test]
    fn test_hooks_called_every_iteration() {
        #[derive(Default)]
        struct Counting {
            begins: usize,
            ends: usize,
        }
        impl LoopHooks for Counting {
            fn begin(&mut self) {
                self.begins += 1;
            }
            fn end(&mut self) {
                self.ends += 1;
            }
        }

        let el = EventLoop::new();
        let count = Arc::new(AtomicUsize::new(0));
        el.push(Event::new(1, counter_handler(&count)));
        let mut hooks = Counting::default();
        el.run_with_hooks(10, &mut hooks).unwrap();
        assert!(hooks.begins >= 2);
        assert_eq!(hooks.begins, hooks.ends);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_can_push() {
        let el = Arc::new(EventLoop::new());
        let count = Arc::new(AtomicUsize::new(0));
        let handler: Arc<dyn EventHandler> = {
            let el = Arc::downgrade(&el);
            let count = Arc::clone(&count);
            Arc::new(move |ev: &Event| {
                count.fetch_add(1, Ordering::SeqCst);
                if ev.kind < 3 {
                    if let Some(el) = el.upgrade() {
                        el.push(Event::new(ev.kind + 1, Arc::clone(ev.handler())));
                    }
                }
            })
        };
        el.push(Event::new(0, handler));
        el.run(30).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_events_drained_from_queue_in_one_batch() {
        let el = Arc::new(EventLoop::new());
        let seen_pending = Arc::new(std::sync::Mutex::new(Vec::new()));
        let handler: Arc<dyn EventHandler> = {
            let el = Arc::downgrade(&el);
            let seen_pending = Arc::clone(&seen_pending);
            Arc::new(move |_: &Event| {
                if let Some(el) = el.upgrade() {
                    seen_pending.lock().unwrap().push(el.pending_events());
                }
            })
        };
        for kind in 0..3 {
            el.push(Event::new(kind, Arc::clone(&handler)));
        }
        assert_eq!(el.pending_events(), 3);
        assert_eq!(el.events.len(), 3);

        el.run(20).unwrap();
        // The whole batch left the queue before the first handler ran.
        assert_eq!(*seen_pending.lock().unwrap(), vec![0, 0, 0]);
        assert_eq!(el.pending_events(), 0);
    }

    #[test]
    fn test_hooks_skip_idle_wakeups() {
        #[derive(Default)]
        struct Counting {
            begins: usize,
        }
        impl LoopHooks for Counting {
            fn begin(&mut self) {
                self.begins += 1;
            }
        }

        let el = Arc::new(EventLoop::new());
        let stopper = {
            let el = Arc::clone(&el);
            thread::spawn(move || {
                while !el.is_running() {
                    thread::yield_now();
                }
                thread::sleep(Duration::from_millis(10));
                el.stop();
            })
        };
        let mut hooks = Counting::default();
        el.run_with_hooks(0, &mut hooks).unwrap();
        stopper.join().unwrap();
        // Stopped while waiting: nothing was dispatched, so no cycle began.
        assert_eq!(hooks.begins, 0);
    }

    fn stop_at(el: &EventLoop, at: MicroTime) -> Timer {
        let running = Arc::clone(&el.running);
        Timer::once(at, move |_| running.store(false, Ordering::Release))
    }

    #[test]
    fn test_stale_stop_timer_ignored() {
        let el = EventLoop::new();
        // The first run ends at once and leaves its 50 ms stop timer queued.
        el.add_timer(stop_at(&el, MicroTime::now()));
        el.run(50).unwrap();
        assert_eq!(el.timer_count(), 1);

        let start = Instant::now();
        el.add_timer(stop_at(&el, MicroTime::now().after(150)));
        el.run(0).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(140));
    }
}
