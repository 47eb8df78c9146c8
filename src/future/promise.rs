//! The writable promise and its read-facing future.
//!
//! A [`Promise`] owns two cells: the result (a [`Try`]) and the
//! cancellation signal. A [`Future`] is a read capability over the same
//! core. Completing the promise drains result waiters exactly once in
//! registration order; cancelling fills the cancelled cell and notifies
//! linked cancellables without touching the result.
//!
//! # Stage advancement
//!
//! `flat_map` (and `rescue` on the failure side) forwards cancellation only
//! to the currently pending parent. Until the parent completes, cancelling
//! the derived future cancels the parent; once the stage advances, that
//! waiter is removed with `unget` and the derived future's cells are
//! *merged* with the inner future's. Merging rather than forwarding is what
//! keeps an N-deep iterative chain at O(1) per link.

use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::cancel::Cancellable;
use crate::cell::Ivar;
use crate::error::Error;
use crate::locals;
use crate::timer::Timer;
use crate::types::attempt::{capture, Try};

struct Core<A> {
    result: Ivar<Try<A>>,
    cancelled: Ivar<()>,
    chained: OnceLock<Future<A>>,
}

impl<A: Clone + Send + 'static> Core<A> {
    fn empty() -> Arc<Self> {
        Arc::new(Self {
            result: Ivar::new(),
            cancelled: Ivar::new(),
            chained: OnceLock::new(),
        })
    }

    fn completed(t: Try<A>) -> Arc<Self> {
        Arc::new(Self {
            result: Ivar::full(t),
            cancelled: Ivar::new(),
            chained: OnceLock::new(),
        })
    }
}

/// The writable end of a computation.
pub struct Promise<A> {
    core: Arc<Core<A>>,
}

impl<A> Clone for Promise<A> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

/// The read-facing view of a computation.
pub struct Future<A> {
    core: Arc<Core<A>>,
}

impl<A> Clone for Future<A> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<A: Clone + Send + 'static> Promise<A> {
    /// Creates an empty promise.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: Core::empty(),
        }
    }

    /// Creates a promise already completed with `t`.
    #[must_use]
    pub fn of(t: Try<A>) -> Self {
        Self {
            core: Core::completed(t),
        }
    }

    /// The read capability over this promise.
    #[must_use]
    pub fn future(&self) -> Future<A> {
        Future {
            core: Arc::clone(&self.core),
        }
    }

    /// Completes with `t`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::error::ErrorKind::ImmutableResult`] if the
    /// promise is already completed.
    pub fn update(&self, t: Try<A>) -> Result<(), Error> {
        if self.core.result.set(t) {
            Ok(())
        } else {
            Err(Error::immutable_result())
        }
    }

    /// Completes with `t` unless already completed. Returns whether this
    /// call performed the completion; exactly one concurrent caller
    /// observes `true`.
    pub fn update_if_empty(&self, t: Try<A>) -> bool {
        self.core.result.set(t)
    }

    /// Completes successfully with `a`.
    ///
    /// # Errors
    ///
    /// Fails if the promise is already completed.
    pub fn set_value(&self, a: A) -> Result<(), Error> {
        self.update(Try::Return(a))
    }

    /// Completes with the failure `e`.
    ///
    /// # Errors
    ///
    /// Fails if the promise is already completed.
    pub fn set_exception(&self, e: Error) -> Result<(), Error> {
        self.update(Try::Throw(e))
    }

    /// Non-blocking read of the result.
    #[must_use]
    pub fn poll(&self) -> Option<Try<A>> {
        self.core.result.poll()
    }

    /// Returns true if the result is set.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.core.result.is_defined()
    }

    /// Requests cancellation. The result cell is untouched; the producer
    /// decides whether to observe the signal.
    pub fn cancel(&self) {
        self.core.cancelled.set(());
    }

    /// Returns true if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.core.cancelled.is_defined()
    }

    /// Runs `f` when this promise is cancelled; immediately if it already
    /// was. This is how a producer observes the signal.
    pub fn on_cancellation<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.core.cancelled.get(move |()| f());
    }

    /// When this promise is cancelled, cancel `target` too.
    pub fn link_to<C>(&self, target: C)
    where
        C: Cancellable + Send + 'static,
    {
        self.on_cancellation(move || target.cancel());
    }
}

impl<A: Clone + Send + 'static> Default for Promise<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Clone + Send + 'static> Cancellable for Promise<A> {
    fn cancel(&self) {
        Self::cancel(self);
    }

    fn is_cancelled(&self) -> bool {
        Self::is_cancelled(self)
    }
}

impl<A: Clone + Send + 'static> Future<A> {
    /// A future already completed with `a`.
    #[must_use]
    pub fn value(a: A) -> Self {
        Self::from_try(Try::Return(a))
    }

    /// A future already failed with `e`.
    #[must_use]
    pub fn exception(e: Error) -> Self {
        Self::from_try(Try::Throw(e))
    }

    /// A future already completed with `t`.
    #[must_use]
    pub fn from_try(t: Try<A>) -> Self {
        Self {
            core: Core::completed(t),
        }
    }

    /// Evaluates `f` now, capturing a panic into a failed future.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce() -> A,
    {
        Self::from_try(capture(f))
    }

    /// Registers a continuation invoked exactly once with the result.
    ///
    /// Returns the chained view of this future, which completes with the
    /// same result; chaining further `respond` calls through it keeps the
    /// waiter graph flat. The thread-local bundle is captured here and
    /// reinstated around the callback (see [`crate::locals`]).
    pub fn respond<K>(&self, k: K) -> Self
    where
        K: FnOnce(Try<A>) + Send + 'static,
    {
        let snapshot = locals::save();
        self.core
            .result
            .get(move |t| locals::with_snapshot(&snapshot, move || k(t)));
        self.chained()
    }

    /// The cached chained view: same result, same cancellation state.
    fn chained(&self) -> Self {
        self.core
            .chained
            .get_or_init(|| Self {
                core: Arc::new(Core {
                    result: self.core.result.chained(),
                    cancelled: self.core.cancelled.clone(),
                    chained: OnceLock::new(),
                }),
            })
            .clone()
    }

    /// Non-blocking read of the result.
    #[must_use]
    pub fn poll(&self) -> Option<Try<A>> {
        self.core.result.poll()
    }

    /// Returns true if the result is set.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.core.result.is_defined()
    }

    /// Returns true if the future is complete or cancelled.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_defined()
    }

    /// Blocks for the result.
    ///
    /// # Errors
    ///
    /// The stored failure on `Throw`, or a timeout error if the deadline
    /// elapses first.
    pub fn get(&self, timeout: Duration) -> Result<A, Error> {
        match self.core.result.wait_for(timeout) {
            Some(Try::Return(a)) => Ok(a),
            Some(Try::Throw(e)) => Err(e),
            None => Err(Error::timeout(timeout)),
        }
    }

    /// Requests cancellation; the result cell is untouched.
    pub fn cancel(&self) {
        self.core.cancelled.set(());
    }

    /// Returns true if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.core.cancelled.is_defined()
    }

    /// Runs `f` when this future is cancelled; immediately if it already
    /// was.
    pub fn on_cancellation<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.core.cancelled.get(move |()| f());
    }

    /// When this future is cancelled, cancel `target` too.
    pub fn link_to<C>(&self, target: C)
    where
        C: Cancellable + Send + 'static,
    {
        self.on_cancellation(move || target.cancel());
    }

    /// Completes a fresh promise with `f` applied to this result.
    ///
    /// Carries the parent-cancellation link until this future completes.
    fn transform<B, F>(&self, f: F) -> Future<B>
    where
        B: Clone + Send + 'static,
        F: FnOnce(Try<A>) -> Try<B> + Send + 'static,
    {
        let p = Promise::new();
        let parent = self.clone();
        let key = p.core.cancelled.get(move |()| parent.cancel());
        let out = p.clone();
        self.respond(move |t| {
            out.core.cancelled.unget(key);
            let next = match capture(move || f(t)) {
                Try::Return(r) => r,
                Try::Throw(e) => Try::Throw(e),
            };
            let _ = out.update_if_empty(next);
        });
        p.future()
    }

    /// Transforms the success value; panics in `f` become failures.
    pub fn map<B, F>(&self, f: F) -> Future<B>
    where
        B: Clone + Send + 'static,
        F: FnOnce(A) -> B + Send + 'static,
    {
        self.transform(move |t| t.map(f))
    }

    /// Chains a dependent asynchronous stage.
    ///
    /// Cancelling the returned future cancels the pending parent; once the
    /// parent succeeds, the returned future's cells merge with the inner
    /// future's, so cancellation then reaches the inner stage instead.
    pub fn flat_map<B, F>(&self, f: F) -> Future<B>
    where
        B: Clone + Send + 'static,
        F: FnOnce(A) -> Future<B> + Send + 'static,
    {
        let p = Promise::new();
        let parent = self.clone();
        let key = p.core.cancelled.get(move |()| parent.cancel());
        let out = p.clone();
        self.respond(move |t| {
            out.core.cancelled.unget(key);
            match t {
                Try::Return(a) => match capture(move || f(a)) {
                    Try::Return(inner) => {
                        out.core.cancelled.merge(&inner.core.cancelled);
                        out.core.result.merge(&inner.core.result);
                    }
                    Try::Throw(e) => {
                        let _ = out.update_if_empty(Try::Throw(e));
                    }
                },
                Try::Throw(e) => {
                    let _ = out.update_if_empty(Try::Throw(e));
                }
            }
        });
        p.future()
    }

    /// Recovers from selected failures with another future.
    ///
    /// `f` returning `None` lets the failure pass through.
    pub fn rescue<F>(&self, f: F) -> Self
    where
        F: FnOnce(&Error) -> Option<Self> + Send + 'static,
    {
        let p = Promise::new();
        let parent = self.clone();
        let key = p.core.cancelled.get(move |()| parent.cancel());
        let out = p.clone();
        self.respond(move |t| {
            out.core.cancelled.unget(key);
            match t {
                Try::Throw(e) => match capture(|| f(&e)) {
                    Try::Return(Some(inner)) => {
                        out.core.cancelled.merge(&inner.core.cancelled);
                        out.core.result.merge(&inner.core.result);
                    }
                    Try::Return(None) => {
                        let _ = out.update_if_empty(Try::Throw(e));
                    }
                    Try::Throw(e2) => {
                        let _ = out.update_if_empty(Try::Throw(e2));
                    }
                },
                ok @ Try::Return(_) => {
                    let _ = out.update_if_empty(ok);
                }
            }
        });
        p.future()
    }

    /// Recovers from selected failures with a plain value.
    pub fn handle<F>(&self, f: F) -> Self
    where
        F: FnOnce(&Error) -> Option<A> + Send + 'static,
    {
        self.transform(move |t| t.handle(f))
    }

    /// Keeps the value only if `p` accepts it.
    pub fn filter<P>(&self, p: P) -> Self
    where
        P: FnOnce(&A) -> bool + Send + 'static,
    {
        self.transform(move |t| t.filter(p))
    }

    /// Runs `f` on completion, success or failure.
    pub fn ensure<F>(&self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.respond(move |_| f())
    }

    /// Pairs this result with another; the first failure wins.
    ///
    /// Cancelling the joined future cancels both inputs.
    pub fn join<B>(&self, other: &Future<B>) -> Future<(A, B)>
    where
        B: Clone + Send + 'static,
    {
        let p = Promise::<(A, B)>::new();
        let slots: Arc<Mutex<(Option<A>, Option<B>)>> = Arc::new(Mutex::new((None, None)));

        let out = p.clone();
        let left = Arc::clone(&slots);
        self.respond(move |t| match t {
            Try::Return(a) => {
                let ready = {
                    let mut s = left.lock();
                    s.0 = Some(a);
                    if s.0.is_some() && s.1.is_some() {
                        Some((
                            s.0.take().expect("left slot filled"),
                            s.1.take().expect("right slot filled"),
                        ))
                    } else {
                        None
                    }
                };
                if let Some(pair) = ready {
                    let _ = out.update_if_empty(Try::Return(pair));
                }
            }
            Try::Throw(e) => {
                let _ = out.update_if_empty(Try::Throw(e));
            }
        });

        let out = p.clone();
        let right = Arc::clone(&slots);
        other.respond(move |t| match t {
            Try::Return(b) => {
                let ready = {
                    let mut s = right.lock();
                    s.1 = Some(b);
                    if s.0.is_some() && s.1.is_some() {
                        Some((
                            s.0.take().expect("left slot filled"),
                            s.1.take().expect("right slot filled"),
                        ))
                    } else {
                        None
                    }
                };
                if let Some(pair) = ready {
                    let _ = out.update_if_empty(Try::Return(pair));
                }
            }
            Try::Throw(e) => {
                let _ = out.update_if_empty(Try::Throw(e));
            }
        });

        let joined = p.future();
        joined.link_to(self.clone());
        joined.link_to(other.clone());
        joined
    }

    /// The first of the two results to arrive, success or failure.
    ///
    /// Cancelling the selected future cancels both inputs.
    pub fn select(&self, other: &Self) -> Self {
        let p = Promise::new();
        for side in [self, other] {
            let out = p.clone();
            side.respond(move |t| {
                let _ = out.update_if_empty(t);
            });
        }
        let selected = p.future();
        selected.link_to(self.clone());
        selected.link_to(other.clone());
        selected
    }

    /// Imposes a deadline using `timer`.
    ///
    /// If the deadline elapses first, the returned future fails with a
    /// timeout error; otherwise it completes with this future's result and
    /// the scheduled task is cancelled. Cancelling the returned future
    /// cancels this one.
    pub fn within(&self, timer: &dyn Timer, timeout: Duration) -> Self {
        let p = Promise::new();
        let timed = p.future();
        timed.link_to(self.clone());

        let out = p.clone();
        let deadline = timer.now() + timeout;
        let task = match timer.schedule_at(
            deadline,
            Box::new(move || {
                let _ = out.update_if_empty(Try::Throw(Error::timeout(timeout)));
            }),
        ) {
            Ok(task) => task,
            Err(e) => return Self::exception(Error::from(e)),
        };

        let out = p.clone();
        self.respond(move |t| {
            let _ = out.update_if_empty(t);
            task.cancel();
        });
        timed
    }

    /// Chain depth of the result cell, for flatness diagnostics.
    #[cfg(test)]
    pub(crate) fn result_chain_depth(&self) -> usize {
        self.core.result.chain_depth()
    }

    /// Waiters currently registered on the result cell.
    #[cfg(test)]
    pub(crate) fn result_waiter_count(&self) -> usize {
        self.core.result.waiter_count()
    }

    /// Registers an interop waiter on the result cell.
    pub(crate) fn result_waiter<F>(&self, k: F) -> crate::cell::WaiterKey
    where
        F: FnOnce(Try<A>) + Send + 'static,
    {
        self.core.result.get(k)
    }

    /// Removes an interop waiter if the result is still pending.
    pub(crate) fn result_unget(&self, key: crate::cell::WaiterKey) {
        self.core.result.unget(key);
    }
}

impl Future<()> {
    /// A completed unit future.
    #[must_use]
    pub fn unit() -> Self {
        Self::value(())
    }
}

impl<A: Clone + Send + 'static> Cancellable for Future<A> {
    fn cancel(&self) {
        Self::cancel(self);
    }

    fn is_cancelled(&self) -> bool {
        Self::is_cancelled(self)
    }
}

impl<A: Clone + Send + std::fmt::Debug + 'static> std::fmt::Debug for Future<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut d = f.debug_struct("Future");
        match self.poll() {
            Some(t) => d.field("result", &t),
            None => d.field("result", &format_args!("<pending>")),
        };
        d.field("cancelled", &self.is_cancelled());
        d.finish()
    }
}

impl<A: Clone + Send + std::fmt::Debug + 'static> std::fmt::Debug for Promise<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut d = f.debug_struct("Promise");
        match self.poll() {
            Some(t) => d.field("result", &t),
            None => d.field("result", &format_args!("<pending>")),
        };
        d.field("cancelled", &self.is_cancelled());
        d.finish()
    }
}
