//! Timers and the sorted timer queue
//!
//! A [`Timer`] is a deadline, a repeat period in milliseconds and a
//! callback. The callback decides each time it fires whether the timer is
//! finished or should come back `increment` milliseconds later.
//!
//! ```text
//!   add(timer) ──► TimerQueue (ascending by time, ties in arrival order)
//!                        │
//!             pop_due(now) / dispatch(now)
//!                        │
//!                        ▼
//!              callback(&FiredTimer) ──► Done      : slot freed
//!                                   └──► Recurring : time += increment, re-added
//! ```

mod queue;

pub use queue::TimerQueue;

use std::fmt;

use fastloop_core::kwarn;

use crate::time::MicroTime;

/// What a timer callback wants done with its timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Remove the timer
    Done,
    /// Fire again `increment` milliseconds after this deadline
    Recurring,
}

impl From<bool> for TimerAction {
    /// `true` means "remove", matching a boolean done flag.
    fn from(done: bool) -> Self {
        if done {
            TimerAction::Done
        } else {
            TimerAction::Recurring
        }
    }
}

/// The data a callback sees when its timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredTimer {
    /// Deadline this firing was scheduled for
    pub time: MicroTime,
    /// Repeat period in milliseconds
    pub increment: u32,
}

/// Timer callback
///
/// Runs on the thread that dispatches the queue. It must not block for
/// long; every other timer and event waits behind it.
pub trait TimerCallback: Send {
    fn on_timer(&mut self, fired: &FiredTimer) -> TimerAction;
}

impl<F> TimerCallback for F
where
    F: FnMut(&FiredTimer) -> TimerAction + Send,
{
    fn on_timer(&mut self, fired: &FiredTimer) -> TimerAction {
        self(fired)
    }
}

/// A scheduled callback
pub struct Timer {
    pub time: MicroTime,
    /// Repeat period in milliseconds; only used by recurring timers
    pub increment: u32,
    callback: Box<dyn TimerCallback>,
}

impl Timer {
    pub fn new(time: MicroTime, increment: u32, callback: impl TimerCallback + 'static) -> Self {
        Self {
            time,
            increment,
            callback: Box::new(callback),
        }
    }

    /// Fire once at `time`
    pub fn once<F>(time: MicroTime, mut f: F) -> Self
    where
        F: FnMut(&FiredTimer) + Send + 'static,
    {
        Self::new(time, 0, move |fired: &FiredTimer| {
            f(fired);
            TimerAction::Done
        })
    }

    /// Fire at `first` and then every `increment` ms for as long as
    /// `f` keeps returning `Recurring`
    pub fn every<F>(first: MicroTime, increment: u32, f: F) -> Self
    where
        F: FnMut(&FiredTimer) -> TimerAction + Send + 'static,
    {
        Self::new(first, increment, f)
    }

    /// Run the callback for the current deadline
    pub fn fire(&mut self) -> TimerAction {
        let fired = FiredTimer {
            time: self.time,
            increment: self.increment,
        };
        self.callback.on_timer(&fired)
    }

    /// Apply a callback's verdict. Returns true if the timer should be
    /// queued again at its advanced deadline.
    pub fn reschedule(&mut self, action: TimerAction) -> bool {
        match action {
            TimerAction::Done => false,
            TimerAction::Recurring if self.increment == 0 => {
                kwarn!("recurring timer at {} has no increment, dropping it", self.time);
                false
            }
            TimerAction::Recurring => {
                self.time.add(u64::from(self.increment));
                true
            }
        }
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("time", &self.time)
            .field("increment", &self.increment)
            .finish_non_exhaustive()
    }
}
