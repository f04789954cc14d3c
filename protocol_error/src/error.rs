//! Fatal protocol error: the terminal error kind for a protocol run.
//!
//! A `FatalProtocolError` is raised where the protocol reaches a state it
//! cannot safely continue from (malformed cryptographic state, a broken
//! invariant, irrecoverable I/O mid-run). It travels up the call stack as
//! the `Err` side of a `Result` until a top-level boundary observes it,
//! see [`crate::report::run_unit`]. Intermediate layers may wrap it with
//! more context but never retry or swallow it.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Shared handle to the error that triggered a fatal failure.
pub type Cause = Arc<dyn Error + Send + Sync + 'static>;

/// Unrecoverable protocol failure carrying a message and an optional cause.
#[derive(Debug, Clone)]
pub struct FatalProtocolError {
    message: String,
    cause: Option<Cause>,
}

impl FatalProtocolError {
    /// Fatal error with a descriptive message and no cause.
    ///
    /// Empty messages are kept as-is; callers are expected to describe the
    /// failed condition.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    /// Fatal error triggered by `cause`, which is moved into the chain.
    pub fn with_cause<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::with_shared_cause(message, Arc::new(cause))
    }

    /// Fatal error whose cause is an already shared error.
    ///
    /// The `Arc` is stored as given, so `Arc::ptr_eq` against the caller's
    /// handle holds for [`FatalProtocolError::shared_cause`].
    pub fn with_shared_cause(message: impl Into<String>, cause: Cause) -> Self {
        Self {
            message: message.into(),
            cause: Some(cause),
        }
    }

    /// Fatal error from a boxed cause (e.g. an `anyhow::Error` via `.into()`).
    pub fn with_boxed_cause(
        message: impl Into<String>,
        cause: Box<dyn Error + Send + Sync + 'static>,
    ) -> Self {
        Self::with_shared_cause(message, Arc::from(cause))
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The error that triggered this one, if any.
    pub fn cause(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub fn shared_cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    pub fn has_cause(&self) -> bool {
        self.cause.is_some()
    }

    /// Walks from this error to the innermost cause.
    pub fn chain(&self) -> Chain<'_> {
        Chain::new(self)
    }

    /// Number of errors in the chain, this one included.
    pub fn depth(&self) -> usize {
        self.chain().count()
    }

    /// Innermost error of the chain; `self` when there is no cause.
    pub fn root_cause(&self) -> &(dyn Error + 'static) {
        self.chain().last().unwrap_or(self)
    }
}

impl fmt::Display for FatalProtocolError {
    /// `{}` prints the message alone, `{:#}` appends every cause as `": cause"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if f.alternate() {
            for cause in self.chain().skip(1) {
                write!(f, ": {}", cause)?;
            }
        }
        Ok(())
    }
}

impl Error for FatalProtocolError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn Error + 'static))
    }
}

/// Iterator over an error and its `source()` chain, outermost first.
///
/// A foreign error whose sources loop back is cut off once the loop is
/// detected (tortoise and hare), so iteration always ends. Errors are
/// compared by address and vtable: a wrapper and a source field stored at
/// offset 0 share an address but are distinct links.
pub struct Chain<'a> {
    next: Option<&'a (dyn Error + 'static)>,
    slow: Option<&'a (dyn Error + 'static)>,
    steps: usize,
}

impl<'a> Chain<'a> {
    pub fn new(head: &'a (dyn Error + 'static)) -> Self {
        Self {
            next: Some(head),
            slow: Some(head),
            steps: 0,
        }
    }
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a (dyn Error + 'static);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let following = current.source();

        // the slow walker moves one link for every two of ours
        self.steps += 1;
        if self.steps % 2 == 0 {
            self.slow = self.slow.and_then(|e| e.source());
        }

        self.next = match (following, self.slow) {
            (Some(f), Some(s)) if std::ptr::eq(f, s) => None,
            _ => following,
        };
        Some(current)
    }
}

/// First `FatalProtocolError` found anywhere in `err`'s chain.
pub fn find_fatal<'a>(err: &'a (dyn Error + 'static)) -> Option<&'a FatalProtocolError> {
    Chain::new(err).find_map(|e| e.downcast_ref::<FatalProtocolError>())
}

/// True if `err` is, or was caused by, a `FatalProtocolError`.
pub fn is_fatal(err: &(dyn Error + 'static)) -> bool {
    find_fatal(err).is_some()
}
