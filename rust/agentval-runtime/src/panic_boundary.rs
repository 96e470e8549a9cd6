//! Panic observation at the instrumentation boundary.
//!
//! An instrumented call that panics is still a failed step. The boundary
//! catches the unwind long enough to record the failure, then hands the
//! original payload back so the panic continues exactly as it would have
//! without instrumentation.
//!
//! # Example
//!
//! ```rust
//! use agentval_runtime::panic_boundary::catch_panic;
//!
//! let caught = catch_panic(|| -> i32 { panic!("oops") }).unwrap_err();
//! assert_eq!(caught.error().message(), "oops");
//!
//! assert_eq!(catch_panic(|| 42).ok(), Some(42));
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{self, UnwindSafe};

// ---------------------------------------------------------------------------
// PanicError
// ---------------------------------------------------------------------------

/// A caught panic, reduced to its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicError {
    message: String,
}

impl PanicError {
    /// Read the message out of a raw panic payload without consuming it.
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        Self {
            message: extract_panic_message(payload),
        }
    }

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic: {}", self.message)
    }
}

impl std::error::Error for PanicError {}

/// Handles `&str` and `String` payloads; falls back to a generic message.
fn extract_panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// CaughtPanic
// ---------------------------------------------------------------------------

/// A panic that has been stopped mid-unwind. Keeps the original payload so
/// the panic can be resumed unchanged.
pub struct CaughtPanic {
    error: PanicError,
    payload: Box<dyn Any + Send>,
}

impl CaughtPanic {
    pub fn error(&self) -> &PanicError {
        &self.error
    }

    /// Continue unwinding with the original payload.
    pub fn resume(self) -> ! {
        panic::resume_unwind(self.payload)
    }
}

impl fmt::Debug for CaughtPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaughtPanic")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Run `f`, converting a panic into `Err(CaughtPanic)`.
pub fn catch_panic<T>(f: impl FnOnce() -> T + UnwindSafe) -> Result<T, CaughtPanic> {
    panic::catch_unwind(f).map_err(|payload| CaughtPanic {
        error: PanicError::from_payload(payload.as_ref()),
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catch_panic_on_success() {
        assert_eq!(catch_panic(|| 42).unwrap(), 42);
    }

    #[test]
    fn catch_panic_on_str_panic() {
        let caught = catch_panic(|| -> i32 { panic!("boom") }).unwrap_err();
        assert_eq!(caught.error().message(), "boom");
        assert_eq!(caught.error().to_string(), "panic: boom");
    }

    #[test]
    fn catch_panic_on_string_panic() {
        let caught = catch_panic(|| -> i32 {
            let msg = String::from("string panic");
            panic!("{}", msg);
        })
        .unwrap_err();
        assert!(caught.error().message().contains("string panic"));
    }

    #[test]
    fn catch_panic_unknown_payload() {
        let caught = catch_panic(|| -> i32 {
            std::panic::panic_any(42_i32);
        })
        .unwrap_err();
        assert_eq!(caught.error().message(), "unknown panic payload");
    }

    #[test]
    fn resume_preserves_payload() {
        let caught = catch_panic(|| -> i32 { std::panic::panic_any(7_u8) }).unwrap_err();
        let resumed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| caught.resume()));
        let payload = resumed.unwrap_err();
        assert_eq!(payload.downcast_ref::<u8>(), Some(&7));
    }

    #[test]
    fn panic_error_implements_std_error() {
        let err = PanicError::new("test");
        let dyn_err: &dyn std::error::Error = &err;
        assert_eq!(dyn_err.to_string(), "panic: test");
        assert!(dyn_err.source().is_none());
    }
}
