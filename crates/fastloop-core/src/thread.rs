//! Thread helpers used by the spin lock backoff

use std::time::Duration;

/// Give up the rest of this time slice
#[inline]
pub fn yield_now() {
    std::thread::yield_now();
}

/// Sleep for `millis` milliseconds.
///
/// Resumes after signal interruptions until the full duration has elapsed.
#[inline]
pub fn sleep_ms(millis: u64) {
    std::thread::sleep(Duration::from_millis(millis));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_sleep_ms_waits_at_least() {
        let start = Instant::now();
        sleep_ms(20);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_yield_returns() {
        yield_now();
    }
}
