//! Helpers for attaching context to failures on their way up.
//!
//! Wrapping never hides the original failure: the error being wrapped
//! becomes the cause of the new fatal error.

use std::error::Error;

use crate::error::FatalProtocolError;

/// Converts a failed `Result` or an empty `Option` into a fatal error.
pub trait FatalContext<T> {
    /// Wraps the failure in a fatal error with `message`.
    fn fatal<M>(self, message: M) -> Result<T, FatalProtocolError>
    where
        M: Into<String>;

    /// Like [`FatalContext::fatal`], building the message only on failure.
    fn with_fatal<M, F>(self, message: F) -> Result<T, FatalProtocolError>
    where
        M: Into<String>,
        F: FnOnce() -> M;
}

impl<T, E> FatalContext<T> for Result<T, E>
where
    E: Error + Send + Sync + 'static,
{
    fn fatal<M>(self, message: M) -> Result<T, FatalProtocolError>
    where
        M: Into<String>,
    {
        self.map_err(|e| FatalProtocolError::with_cause(message, e))
    }

    fn with_fatal<M, F>(self, message: F) -> Result<T, FatalProtocolError>
    where
        M: Into<String>,
        F: FnOnce() -> M,
    {
        self.map_err(|e| FatalProtocolError::with_cause(message(), e))
    }
}

impl<T> FatalContext<T> for Option<T> {
    fn fatal<M>(self, message: M) -> Result<T, FatalProtocolError>
    where
        M: Into<String>,
    {
        self.ok_or_else(|| FatalProtocolError::new(message))
    }

    fn with_fatal<M, F>(self, message: F) -> Result<T, FatalProtocolError>
    where
        M: Into<String>,
        F: FnOnce() -> M,
    {
        self.ok_or_else(|| FatalProtocolError::new(message()))
    }
}

/// Returns early with a causeless [`FatalProtocolError`] built from a format string.
///
/// The error goes through `From`, so it also works in functions returning
/// `Result<_, Box<dyn Error + Send + Sync>>`.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)+) => {
        return ::core::result::Result::Err(::core::convert::From::from(
            $crate::FatalProtocolError::new(::std::format!($($arg)+)),
        ))
    };
}

/// Returns early with a fatal error unless `cond` holds.
#[macro_export]
macro_rules! ensure_fatal {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::fatal!($($arg)+);
        }
    };
}
