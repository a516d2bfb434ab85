//! Wall-clock timestamps with microsecond resolution
//!
//! `MicroTime` is a plain count of microseconds since the Unix epoch. All
//! ordering is integer ordering. Two sentinels exist: [`MicroTime::MAX`]
//! ("never", an unbounded wait) and [`MicroTime::MIN`] (zero).

use std::fmt;

use fastloop_core::error::{CoreError, CoreResult, OrAbort};

/// Absolute wall-clock time in microseconds
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MicroTime(u64);

impl MicroTime {
    /// "Never"; compares greater than every real timestamp
    pub const MAX: MicroTime = MicroTime(u64::MAX);
    pub const MIN: MicroTime = MicroTime(0);

    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        MicroTime(micros)
    }

    #[inline]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Sample the wall clock
    pub fn try_now() -> CoreResult<Self> {
        realtime_micros().map(MicroTime)
    }

    /// Sample the wall clock; a clock failure aborts.
    #[track_caller]
    pub fn now() -> Self {
        Self::try_now().or_abort()
    }

    /// Advance by `millis` milliseconds in place. `MAX` stays `MAX`.
    #[inline]
    pub fn add(&mut self, millis: u64) -> &mut Self {
        self.0 = self.0.saturating_add(millis.saturating_mul(1_000));
        self
    }

    /// Copy advanced by `millis` milliseconds
    #[inline]
    #[must_use]
    pub fn after(mut self, millis: u64) -> Self {
        self.add(millis);
        self
    }

    #[inline]
    pub fn set_max(&mut self) {
        self.0 = u64::MAX;
    }

    #[inline]
    pub fn set_min(&mut self) {
        self.0 = 0;
    }

    #[inline]
    pub fn is_max(self) -> bool {
        self.0 == u64::MAX
    }

    #[inline]
    pub fn is_min(self) -> bool {
        self.0 == 0
    }

    /// Microseconds from `earlier` to `self`, zero if `earlier` is later
    #[inline]
    pub fn micros_since(self, earlier: MicroTime) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Absolute `timespec` for `pthread_cond_timedwait` on CLOCK_REALTIME
    #[cfg(unix)]
    pub fn to_timespec(self) -> libc::timespec {
        libc::timespec {
            tv_sec: (self.0 / 1_000_000) as libc::time_t,
            tv_nsec: ((self.0 % 1_000_000) * 1_000) as libc::c_long,
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn realtime_micros() -> CoreResult<u64> {
            use nix::time::{clock_gettime, ClockId};
            let ts = clock_gettime(ClockId::CLOCK_REALTIME)
                .map_err(|e| CoreError::os("clock_gettime", e as i32))?;
            Ok(ts.tv_sec() as u64 * 1_000_000 + ts.tv_nsec() as u64 / 1_000)
        }
    } else {
        fn realtime_micros() -> CoreResult<u64> {
            let d = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_err(|_| CoreError::os("clock_gettime", 0))?;
            Ok(d.as_micros() as u64)
        }
    }
}

impl Default for MicroTime {
    /// The `MAX` sentinel: a default deadline never expires.
    fn default() -> Self {
        Self::MAX
    }
}

impl fmt::Display for MicroTime {
    /// Time of day (UTC) as `HHMMSS.uuuuuu`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let micros = self.0 % 1_000_000;
        let secs = self.0 / 1_000_000;
        write!(
            f,
            "{:02}{:02}{:02}.{:06}",
            (secs / 3600) % 24,
            (secs / 60) % 60,
            secs % 60,
            micros
        )
    }
}

impl fmt::Debug for MicroTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_max() {
            f.write_str("MicroTime(MAX)")
        } else {
            write!(f, "MicroTime({})", self.0)
        }
    }
}
