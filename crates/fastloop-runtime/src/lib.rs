//! # fastloop-runtime
//!
//! OS-backed half of fastloop: pthread monitors, the wall clock, the timer
//! queue, the MPSC fast queue and the event loop that ties them together.
//!
//! ## Modules
//!
//! - `config` - `RuntimeConfig` (build-time defaults + `FL_*` env overrides)
//! - `sync` - Mutex, Condition and Monitor over pthread
//! - `time` - `MicroTime` wall-clock timestamps
//! - `timer` - Timers and the sorted `TimerQueue`
//! - `queue` - `FastQueue`, the batch-transfer MPSC queue
//! - `event_loop` - `EventLoop`, events and handlers

pub mod config;
pub mod event_loop;
pub mod queue;
pub mod sync;
pub mod time;
pub mod timer;

pub use config::{ConfigError, RuntimeConfig};
pub use event_loop::{Event, EventHandler, EventLoop, LoopHooks, Payload};
pub use queue::{Batch, FastQueue, QueueState};
pub use sync::{Condition, Monitor, Mutex, MutexGuard, WaitStatus};
pub use time::MicroTime;
pub use timer::{FiredTimer, Timer, TimerAction, TimerCallback, TimerQueue};
