//! Error types for the fastloop runtime
//!
//! Two categories exist and both are unrecoverable:
//!
//! - environment failures (out of memory, an OS primitive refusing to
//!   initialize or operate)
//! - caller contract violations (a programming error detected at runtime)
//!
//! Primitives return `CoreResult` and let the caller decide where to stop.
//! `OrAbort::or_abort` is the one place that turns an error into process
//! termination. A condition-wait timeout is never an error; it is reported as
//! a distinct return value by the waiting primitive.

use core::fmt;

/// Result type for runtime operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in runtime operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The system allocator could not satisfy a request
    OutOfMemory {
        /// Size of the failed request in bytes
        bytes: usize,
    },

    /// An OS primitive (mutex, condition, clock) failed
    Os {
        /// The failing call, e.g. `"pthread_mutex_init"`
        op: &'static str,
        /// Raw OS error code
        code: i32,
    },

    /// The caller broke a documented contract
    Contract(&'static str),
}

impl CoreError {
    /// Build an OS error from a call name and error code
    #[inline]
    pub fn os(op: &'static str, code: i32) -> Self {
        CoreError::Os { op, code }
    }

    /// True for resource exhaustion and OS failures
    #[inline]
    pub fn is_environment(&self) -> bool {
        matches!(self, CoreError::OutOfMemory { .. } | CoreError::Os { .. })
    }

    /// True for programming errors detected at runtime
    #[inline]
    pub fn is_contract(&self) -> bool {
        matches!(self, CoreError::Contract(_))
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::OutOfMemory { bytes } => {
                write!(f, "out of memory allocating {} bytes", bytes)
            }
            CoreError::Os { op, code } => write!(
                f,
                "{}() failed, sys error: {}",
                op,
                std::io::Error::from_raw_os_error(*code)
            ),
            CoreError::Contract(msg) => write!(f, "contract violation: {}", msg),
        }
    }
}

impl std::error::Error for CoreError {}

/// Fail-fast conversion for results that have no safe continuation.
///
/// Logs the error with the caller's source location and aborts the process.
pub trait OrAbort<T> {
    /// Unwrap the value or abort the process
    fn or_abort(self) -> T;
}

impl<T> OrAbort<T> for CoreResult<T> {
    #[inline]
    #[track_caller]
    fn or_abort(self) -> T {
        match self {
            Ok(value) => value,
            Err(err) => abort_with(&err),
        }
    }
}

/// Log `err` with the caller's location and abort.
#[cold]
#[track_caller]
pub fn abort_with(err: &CoreError) -> ! {
    let loc = core::panic::Location::caller();
    crate::kerror!("{}:{} {}", loc.file(), loc.line(), err);
    std::process::abort()
}
