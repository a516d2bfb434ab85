//! # fastloop - concurrency and memory runtime for network servers
//!
//! A small substrate for request handling: hardware atomics, arena and pool
//! allocators, a backoff spin lock, pthread monitors, a sorted timer queue,
//! a multi-producer batch queue and the event loop that merges them.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use fastloop::{Event, EventHandler, EventLoop, MicroTime, Timer, TimerAction};
//!
//! let el = Arc::new(EventLoop::new());
//! let handler: Arc<dyn EventHandler> = Arc::new(|ev: &Event| {
//!     println!("event {}", ev.kind);
//! });
//!
//! el.push(Event::new(5, handler));
//! el.add_timer(Timer::every(MicroTime::now().after(100), 100, |fired| {
//!     println!("tick at {}", fired.time);
//!     TimerAction::Recurring
//! }));
//! el.run(1_000)?; // one second, then return
//! ```
//!
//! ## Architecture
//!
//! ```text
//!   producer threads          timers (add_timer)
//!          │ push                   │
//!          ▼                        ▼
//!   ┌──────────────┐        ┌──────────────┐
//!   │  write list  │        │  TimerQueue  │   both behind one Monitor
//!   └──────────────┘        └──────────────┘
//!          └───────────┬───────────┘
//!                      ▼
//!                 EventLoop::run
//!        timed wait until the earliest deadline,
//!        then dispatch a batch of events or the due timers
//! ```
//!
//! ## Logging
//!
//! `FL_LOG_LEVEL=off|error|warn|info|debug|trace` selects the stderr log
//! level; `FL_FLUSH_EPRINT=1` flushes after every line.

// Re-export core types
pub use fastloop_core::{
    atomic,
    constants,
    BackoffConfig,
    Bin,
    CoreError,
    CoreResult,
    OrAbort,
    Pool,
    PoolKey,
    Region,
    SpinLock,
    SpinLockGuard,
};

// Re-export kprint macros for debug logging
pub use fastloop_core::{kprint, kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use fastloop_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled};

// Re-export env utilities
pub use fastloop_core::{env_get, env_get_bool, env_get_nonzero, env_get_opt, env_get_str, env_is_set};

// Re-export runtime types
pub use fastloop_runtime::{
    Batch,
    Condition,
    ConfigError,
    Event,
    EventHandler,
    EventLoop,
    FastQueue,
    FiredTimer,
    LoopHooks,
    MicroTime,
    Monitor,
    Mutex,
    MutexGuard,
    Payload,
    QueueState,
    RuntimeConfig,
    Timer,
    TimerAction,
    TimerCallback,
    TimerQueue,
    WaitStatus,
};

/// Commonly used items in one import
pub mod prelude {
    pub use crate::{
        Event, EventHandler, EventLoop, FastQueue, MicroTime, Monitor, OrAbort, SpinLock, Timer,
        TimerAction,
    };
}
