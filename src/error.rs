//! Error types and error handling strategy.
//!
//! A single [`Error`] type flows through every failed future. Error handling
//! follows these principles:
//!
//! - Errors are values: a `Throw` carries an `Error`, and rescue combinators
//!   may turn it back into a `Return`.
//! - Errors are cloneable, because one failure is delivered to every waiter
//!   on a cell.
//! - Panics inside user thunks are captured and carried as
//!   [`ErrorKind::Panicked`]; they never escape a timer or completion path.

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::types::time::DurationDisplay;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A deadline elapsed before the future completed.
    Timeout,
    /// The operation observed cancellation and gave up.
    Cancelled,
    /// A second completion was attempted on an already-full promise.
    ImmutableResult,
    /// A `filter` predicate rejected the value.
    PredicateFailed,
    /// A user-supplied thunk panicked; the payload text is in the context.
    Panicked,
    /// User-provided error.
    User,
}

impl ErrorKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::ImmutableResult => "result is immutable once set",
            Self::PredicateFailed => "predicate failed",
            Self::Panicked => "panicked",
            Self::User => "error",
        }
    }
}

/// The error value carried by a `Throw`.
///
/// Cloneable so a single failure can fan out to every registered waiter;
/// the optional source is shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            source: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the context text, if any.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns true if this error is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Adds context text to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// A timeout error naming the deadline span that elapsed.
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::new(ErrorKind::Timeout).with_context(DurationDisplay(after).to_string())
    }

    /// A cancellation error.
    #[must_use]
    pub const fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled)
    }

    /// The error returned when updating an already-completed promise.
    #[must_use]
    pub const fn immutable_result() -> Self {
        Self::new(ErrorKind::ImmutableResult)
    }

    /// The error stored when a `filter` predicate rejects a value.
    #[must_use]
    pub const fn predicate_failed() -> Self {
        Self::new(ErrorKind::PredicateFailed)
    }

    /// Wraps a captured panic payload.
    #[must_use]
    pub fn panicked(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Panicked).with_context(message)
    }

    /// A user-domain error with a message.
    #[must_use]
    pub fn user(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::User).with_context(message)
    }
}

/// Equality compares kind and context; sources are identity-opaque and
/// deliberately ignored.
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.context == other.context
    }
}

impl Eq for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(ctx) => write!(f, "{}: {ctx}", self.kind.as_str()),
            None => f.write_str(self.kind.as_str()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn std::error::Error + 'static))
    }
}

/// Misuse of a timer surface.
///
/// These are programming errors in the caller, not runtime conditions, and
/// surface on the scheduling paths that can reject work.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    /// The timer has been stopped and no longer accepts work.
    #[error("timer is stopped")]
    Stopped,
    /// The timer variant does not support periodic scheduling.
    #[error("periodic scheduling unsupported")]
    PeriodicUnsupported,
    /// A reference-counting timer was used before `acquire`.
    #[error("timer not acquired")]
    NotAcquired,
}

impl From<TimerError> for Error {
    fn from(e: TimerError) -> Self {
        Self::new(ErrorKind::User)
            .with_context("timer rejected scheduling")
            .with_source(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_carries_duration_text() {
        let e = Error::timeout(Duration::from_millis(50));
        assert_eq!(e.kind(), ErrorKind::Timeout);
        assert_eq!(e.to_string(), "timeout: 50ms");
    }

    #[test]
    fn equality_ignores_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let a = Error::user("boom").with_source(io);
        let b = Error::user("boom");
        assert_eq!(a, b);
        assert_ne!(a, Error::user("other"));
        assert_ne!(a, Error::cancelled());
    }

    #[test]
    fn source_chain_is_reachable() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "inner");
        let e = Error::user("outer").with_source(io);
        let src = std::error::Error::source(&e).expect("source");
        assert_eq!(src.to_string(), "inner");
    }

    #[test]
    fn timer_error_display() {
        assert_eq!(TimerError::Stopped.to_string(), "timer is stopped");
        assert_eq!(
            TimerError::PeriodicUnsupported.to_string(),
            "periodic scheduling unsupported"
        );
    }
}
