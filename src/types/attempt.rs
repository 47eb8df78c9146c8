//! Success-or-failure sum carried by every completed future.
//!
//! [`Try`] is the result value a promise stores: `Return(a)` on success,
//! `Throw(e)` on failure. All transforms are total: a panic inside a
//! user-supplied closure is captured into a `Throw` rather than unwinding
//! through the completion path.

use core::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::error::Error;

/// The outcome of a computation: a value or an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Try<A> {
    /// Success with a value.
    Return(A),
    /// Failure with an error.
    Throw(Error),
}

impl<A> Try<A> {
    /// Runs `f`, capturing a panic into `Throw`.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce() -> A,
    {
        capture(f)
    }

    /// Returns true if this is a `Return`.
    #[must_use]
    pub const fn is_return(&self) -> bool {
        matches!(self, Self::Return(_))
    }

    /// Returns true if this is a `Throw`.
    #[must_use]
    pub const fn is_throw(&self) -> bool {
        matches!(self, Self::Throw(_))
    }

    /// Transforms the success value; panics in `f` become `Throw`.
    pub fn map<B, F>(self, f: F) -> Try<B>
    where
        F: FnOnce(A) -> B,
    {
        match self {
            Self::Return(a) => capture(move || f(a)),
            Self::Throw(e) => Try::Throw(e),
        }
    }

    /// Chains a dependent computation; panics in `f` become `Throw`.
    pub fn and_then<B, F>(self, f: F) -> Try<B>
    where
        F: FnOnce(A) -> Try<B>,
    {
        match self {
            Self::Return(a) => match capture(move || f(a)) {
                Try::Return(t) => t,
                Try::Throw(e) => Try::Throw(e),
            },
            Self::Throw(e) => Try::Throw(e),
        }
    }

    /// Keeps the value only if `p` accepts it; otherwise stores a
    /// predicate-failed error.
    pub fn filter<P>(self, p: P) -> Self
    where
        P: FnOnce(&A) -> bool,
    {
        match self {
            Self::Return(a) => match capture(|| p(&a)) {
                Try::Return(true) => Self::Return(a),
                Try::Return(false) => Self::Throw(Error::predicate_failed()),
                Try::Throw(e) => Self::Throw(e),
            },
            Self::Throw(e) => Self::Throw(e),
        }
    }

    /// Recovers from selected errors with another attempt.
    ///
    /// `f` returning `None` leaves the error untouched.
    pub fn rescue<F>(self, f: F) -> Self
    where
        F: FnOnce(&Error) -> Option<Self>,
    {
        match self {
            Self::Throw(e) => f(&e).unwrap_or(Self::Throw(e)),
            ok => ok,
        }
    }

    /// Recovers from selected errors with a plain value.
    pub fn handle<F>(self, f: F) -> Self
    where
        F: FnOnce(&Error) -> Option<A>,
    {
        self.rescue(|e| f(e).map(Try::Return))
    }

    /// The success value, if any.
    pub fn ok(self) -> Option<A> {
        match self {
            Self::Return(a) => Some(a),
            Self::Throw(_) => None,
        }
    }

    /// The error, if any.
    pub fn err(self) -> Option<Error> {
        match self {
            Self::Return(_) => None,
            Self::Throw(e) => Some(e),
        }
    }

    /// Converts into a `Result`.
    pub fn into_result(self) -> Result<A, Error> {
        match self {
            Self::Return(a) => Ok(a),
            Self::Throw(e) => Err(e),
        }
    }
}

impl<A> From<Result<A, Error>> for Try<A> {
    fn from(r: Result<A, Error>) -> Self {
        match r {
            Ok(a) => Self::Return(a),
            Err(e) => Self::Throw(e),
        }
    }
}

impl<A: fmt::Display> fmt::Display for Try<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Return(a) => write!(f, "Return({a})"),
            Self::Throw(e) => write!(f, "Throw({e})"),
        }
    }
}

/// Runs a thunk, converting a panic into `Throw(Error::panicked(..))`.
///
/// The panic payload text is preserved when it is a `&str` or `String`.
pub(crate) fn capture<T>(f: impl FnOnce() -> T) -> Try<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(v) => Try::Return(v),
        Err(payload) => Try::Throw(Error::panicked(panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn map_transforms_return() {
        let t = Try::Return(2).map(|x| x * 10);
        assert_eq!(t, Try::Return(20));
    }

    #[test]
    fn map_passes_throw_through() {
        let t: Try<i32> = Try::Throw(Error::user("boom"));
        assert_eq!(t.map(|x| x + 1), Try::Throw(Error::user("boom")));
    }

    #[test]
    fn map_captures_panic() {
        let t = Try::Return(1).map(|_| -> i32 { panic!("blew up") });
        match t {
            Try::Throw(e) => {
                assert_eq!(e.kind(), ErrorKind::Panicked);
                assert_eq!(e.context(), Some("blew up"));
            }
            Try::Return(_) => unreachable!("panic must become Throw"),
        }
    }

    #[test]
    fn filter_rejects_with_predicate_failed() {
        assert_eq!(Try::Return(3).filter(|x| *x > 2), Try::Return(3));
        assert_eq!(
            Try::Return(1).filter(|x| *x > 2),
            Try::Throw(Error::predicate_failed())
        );
    }

    #[test]
    fn rescue_recovers_selected_errors() {
        let t: Try<i32> = Try::Throw(Error::timeout(std::time::Duration::from_secs(1)));
        let recovered = t.rescue(|e| e.is_timeout().then(|| Try::Return(0)));
        assert_eq!(recovered, Try::Return(0));

        let t: Try<i32> = Try::Throw(Error::user("other"));
        let untouched = t.rescue(|e| e.is_timeout().then(|| Try::Return(0)));
        assert_eq!(untouched, Try::Throw(Error::user("other")));
    }

    #[test]
    fn handle_recovers_with_value() {
        let t: Try<i32> = Try::Throw(Error::user("x"));
        assert_eq!(t.handle(|_| Some(7)), Try::Return(7));
    }

    #[test]
    fn and_then_chains() {
        let t = Try::Return(2).and_then(|x| Try::Return(x + 1));
        assert_eq!(t, Try::Return(3));
        let t = Try::Return(2).and_then(|_| -> Try<i32> { Try::Throw(Error::user("mid")) });
        assert_eq!(t, Try::Throw(Error::user("mid")));
    }

    #[test]
    fn from_fn_captures() {
        assert_eq!(Try::from_fn(|| 5), Try::Return(5));
        assert!(Try::from_fn(|| -> i32 { panic!("p") }).is_throw());
    }

    #[test]
    fn result_round_trip() {
        let t: Try<i32> = Ok::<_, Error>(4).into();
        assert_eq!(t.clone().into_result(), Ok(4));
        assert_eq!(t.ok(), Some(4));
    }
}
