//! Kernel-style print macros for fastloop
//!
//! Line-atomic, optionally-flushing diagnostics on stderr. The runtime logs
//! pool growth at debug, idle waits at trace and fatal aborts at error.
//!
//! # Environment Variables
//!
//! - `FL_FLUSH_EPRINT=1` - Flush stderr after each print (useful when the process aborts)
//! - `FL_LOG_LEVEL=<level>` - off, error, warn, info, debug, trace (or 0-5)
//!
//! # Usage
//!
//! ```ignore
//! use fastloop_core::{kdebug, kinfo, kwarn, kerror};
//!
//! kdebug!("{} capacity: {}", name, capacity);
//! kinfo!("event loop started");
//! kwarn!("stale pool key {:?}", key);
//! kerror!("{}:{} {}", file, line, err);
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Once;

/// Log levels, lowest is most severe
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Decode a stored level; anything above 5 means trace
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// Parse a level name or digit; unknown input falls back to info
    pub fn parse(val: &str) -> Self {
        match val.trim().to_lowercase().as_str() {
            "off" | "0" => LogLevel::Off,
            "error" | "1" => LogLevel::Error,
            "warn" | "2" => LogLevel::Warn,
            "debug" | "4" => LogLevel::Debug,
            "trace" | "5" => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    }

    /// Fixed-width tag printed before each leveled line
    pub fn tag(&self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "[ERROR]",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Info => "[INFO] ",
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Trace => "[TRACE]",
        }
    }
}

const FLUSH_BIT: u8 = 0x80;
const LEVEL_MASK: u8 = 0x7f;

// Level in the low bits, flush flag in the top bit.
static STATE: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static ENV_INIT: Once = Once::new();

/// Read `FL_LOG_LEVEL` / `FL_FLUSH_EPRINT` once.
///
/// Runs lazily on the first log call; calling it early makes the
/// environment win over nothing but itself.
pub fn init() {
    ENV_INIT.call_once(|| {
        let mut state = STATE.load(Ordering::Relaxed);
        if let Ok(val) = std::env::var("FL_LOG_LEVEL") {
            state = (state & FLUSH_BIT) | LogLevel::parse(&val) as u8;
        }
        if crate::env::env_get_bool("FL_FLUSH_EPRINT", false) {
            state |= FLUSH_BIT;
        }
        STATE.store(state, Ordering::Relaxed);
    });
}

#[inline]
fn state() -> u8 {
    init();
    STATE.load(Ordering::Relaxed)
}

/// Current log level
#[inline]
pub fn log_level() -> LogLevel {
    LogLevel::from_u8(state() & LEVEL_MASK)
}

/// Whether every print flushes stderr
#[inline]
pub fn flush_enabled() -> bool {
    state() & FLUSH_BIT != 0
}

/// Set log level programmatically (overrides the environment)
pub fn set_log_level(level: LogLevel) {
    init();
    let _ = STATE.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |s| {
        Some((s & FLUSH_BIT) | level as u8)
    });
}

/// Set flush mode programmatically (overrides the environment)
pub fn set_flush_enabled(enabled: bool) {
    init();
    if enabled {
        STATE.fetch_or(FLUSH_BIT, Ordering::Relaxed);
    } else {
        STATE.fetch_and(LEVEL_MASK, Ordering::Relaxed);
    }
}

/// Check if a log level is enabled
#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level != LogLevel::Off && level <= log_level()
}

/// Write one record while holding the stderr lock.
#[doc(hidden)]
pub fn _emit(tag: Option<&str>, args: std::fmt::Arguments<'_>, newline: bool) {
    let stderr = std::io::stderr();
    let mut out = stderr.lock();
    if let Some(tag) = tag {
        let _ = write!(out, "{} ", tag);
    }
    let _ = out.write_fmt(args);
    if newline {
        let _ = out.write_all(b"\n");
    }
    if flush_enabled() {
        let _ = out.flush();
    }
}

/// Leveled record, dropped when the level is filtered out.
#[doc(hidden)]
pub fn _klog_impl(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if level_enabled(level) {
        _emit(Some(level.tag()), args, true);
    }
}

/// Print to stderr (no newline)
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => {{
        $crate::kprint::_emit(None, format_args!($($arg)*), false);
    }};
}

/// Print to stderr with newline
#[macro_export]
macro_rules! kprintln {
    () => {{
        $crate::kprint::_emit(None, format_args!(""), true);
    }};
    ($($arg:tt)*) => {{
        $crate::kprint::_emit(None, format_args!($($arg)*), true);
    }};
}

/// Error level log (always shown unless logging is off)
#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl($crate::kprint::LogLevel::Error, format_args!($($arg)*));
    }};
}

/// Warning level log
#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl($crate::kprint::LogLevel::Warn, format_args!($($arg)*));
    }};
}

/// Info level log
#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl($crate::kprint::LogLevel::Info, format_args!($($arg)*));
    }};
}

/// Debug level log
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl($crate::kprint::LogLevel::Debug, format_args!($($arg)*));
    }};
}

/// Trace level log (most verbose)
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl($crate::kprint::LogLevel::Trace, format_args!($($arg)*));
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels_ordered() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_level_from_u8() {
        assert_eq!(LogLevel::from_u8(0), LogLevel::Off);
        assert_eq!(LogLevel::from_u8(2), LogLevel::Warn);
        assert_eq!(LogLevel::from_u8(99), LogLevel::Trace);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(LogLevel::parse("DEBUG"), LogLevel::Debug);
        assert_eq!(LogLevel::parse(" warn "), LogLevel::Warn);
        assert_eq!(LogLevel::parse("0"), LogLevel::Off);
        assert_eq!(LogLevel::parse("verbose"), LogLevel::Info);
    }

    #[test]
    fn test_off_is_never_enabled() {
        assert!(!level_enabled(LogLevel::Off));
    }

    #[test]
    fn test_macros_compile() {
        // Output is only inspected by hand; keep the test run quiet.
        let previous = log_level();
        set_log_level(LogLevel::Off);

        kprint!("queue");
        kprintln!("capacity {}", 256);
        kerror!("abort {}", "msg");
        kwarn!("stale key");
        kinfo!("loop started");
        kdebug!("Pool capacity: {}", 128);
        ktrace!("event queue is empty, waiting...");

        set_log_level(previous);
    }
}
