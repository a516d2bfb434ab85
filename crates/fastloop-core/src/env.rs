//! Environment variable utilities
//!
//! Every runtime knob (`FL_*`) is read through these helpers so a bad value
//! never aborts: unparsable input silently keeps the default.
//!
//! # Usage
//!
//! ```ignore
//! use fastloop_core::env::{env_get, env_get_bool, env_get_nonzero};
//!
//! let sleep_max: u64 = env_get("FL_BACKOFF_SLEEP_MAX_MS", 512);
//! let blocks = env_get_nonzero("FL_POOL_INIT_BLOCKS", 128);
//! let flush = env_get_bool("FL_FLUSH_EPRINT", false);
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get a size-like variable that must not be zero.
///
/// `0`, unset and unparsable all yield `default`, matching how pool and
/// queue constructors treat a zero size.
#[inline]
pub fn env_get_nonzero(key: &str, default: usize) -> usize {
    match env_get_opt::<usize>(key) {
        Some(0) | None => default,
        Some(v) => v,
    }
}

/// Get environment variable as boolean
///
/// Accepts: "1", "true", "yes", "on" (case-insensitive) as true.
/// Any other value is false; unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Get environment variable as optional value
///
/// `None` when unset or when the value does not parse as `T`.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as string, or return default
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Check if environment variable is set (regardless of value)
#[inline]
pub fn env_is_set(key: &str) -> bool {
    std::env::var_os(key).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test owns its variable names; the test harness runs in parallel.

    #[test]
    fn test_unset_yields_defaults() {
        let key = "__FL_TEST_UNSET__";
        assert_eq!(env_get::<u64>(key, 512), 512);
        assert_eq!(env_get_nonzero(key, 128), 128);
        assert!(env_get_bool(key, true));
        assert!(env_get_opt::<usize>(key).is_none());
        assert_eq!(env_get_str(key, "loop"), "loop");
        assert!(!env_is_set(key));
    }

    #[test]
    fn test_parse_and_trim() {
        std::env::set_var("__FL_TEST_INCR__", " 2048 ");
        assert_eq!(env_get::<usize>("__FL_TEST_INCR__", 1024), 2048);
        std::env::remove_var("__FL_TEST_INCR__");
    }

    #[test]
    fn test_invalid_keeps_default() {
        std::env::set_var("__FL_TEST_BAD__", "lots");
        assert_eq!(env_get::<u32>("__FL_TEST_BAD__", 32), 32);
        std::env::remove_var("__FL_TEST_BAD__");
    }

    #[test]
    fn test_nonzero_rejects_zero() {
        std::env::set_var("__FL_TEST_ZERO__", "0");
        assert_eq!(env_get_nonzero("__FL_TEST_ZERO__", 128), 128);
        std::env::set_var("__FL_TEST_ZERO__", "7");
        assert_eq!(env_get_nonzero("__FL_TEST_ZERO__", 128), 7);
        std::env::remove_var("__FL_TEST_ZERO__");
    }

    #[test]
    fn test_bool_variants() {
        let key = "__FL_TEST_FLAG__";
        for truthy in ["1", "true", "TRUE", "yes", "on"] {
            std::env::set_var(key, truthy);
            assert!(env_get_bool(key, false), "{} should be true", truthy);
        }
        for falsy in ["0", "false", "off", "garbage"] {
            std::env::set_var(key, falsy);
            assert!(!env_get_bool(key, true), "{} should be false", falsy);
        }
        std::env::remove_var(key);
    }
}
