//! Deferred and periodic scheduling.
//!
//! A [`Timer`] schedules thunks at instants and hands back cancellable
//! [`TimerTask`] handles. The trait is object-safe; the conveniences that
//! need generics (`do_later`, `do_at`, delay-relative scheduling) live on
//! [`TimerExt`], which is implemented for every timer including trait
//! objects.
//!
//! # Variants
//!
//! - [`NullTimer`]: runs thunks synchronously; for tests where
//!   "eventually" means "immediately"
//! - [`ThreadTimer`]: one background thread, fixed-delay periodics
//! - [`PoolTimer`]: worker pool, fixed-rate periodics, concurrent firing
//! - [`CountingTimer`]: reference-counted lazy construction of an
//!   underlying timer
//! - [`ThreadStoppingTimer`]: proxies scheduling, dispatches `stop` to an
//!   auxiliary thread so a timer thread may stop its own timer
//! - [`MockTimer`]: deterministic logical clock driven by `advance`/`tick`
//!
//! # Failure policy
//!
//! A thunk that panics on a timer thread is captured and logged; it never
//! unwinds the worker. Thunks routed through a promise (`do_at`,
//! `do_later`, `within`) store the capture as a failed result instead.

pub mod counting;
pub mod mock;
pub mod null;
pub mod pool;
pub mod stopping;
pub mod thread;

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, TimerError};
use crate::future::{Future, Promise};
use crate::types::attempt::Try;
use crate::types::Time;

pub use counting::CountingTimer;
pub use mock::MockTimer;
pub use null::NullTimer;
pub use pool::PoolTimer;
pub use stopping::ThreadStoppingTimer;
pub use thread::ThreadTimer;

/// A one-shot thunk handed to a timer.
pub type Thunk = Box<dyn FnOnce() + Send>;

/// A repeatedly invoked thunk for periodic scheduling.
pub type PeriodicThunk = Box<dyn FnMut() + Send>;

/// A scheduled task handle.
pub trait TimerTask: Send + Sync {
    /// Removes the task from its timer, best-effort. Idempotent;
    /// cancelling after the task fired is a no-op.
    fn cancel(&self);
}

/// A scheduler of deferred and periodic thunks.
pub trait Timer: Send + Sync {
    /// The timer's current instant. Production timers read the wall
    /// clock; the mock timer reads its logical clock.
    fn now(&self) -> Time {
        Time::now()
    }

    /// Schedules `thunk` to run once at `when`.
    ///
    /// # Errors
    ///
    /// Fails if the timer no longer (or does not yet) accepts work.
    fn schedule_at(&self, when: Time, thunk: Thunk) -> Result<Arc<dyn TimerTask>, TimerError>;

    /// Schedules `thunk` to run at `first` and then periodically.
    ///
    /// Whether the period is measured fixed-delay or fixed-rate is a
    /// property of the timer variant; see each implementation.
    ///
    /// # Errors
    ///
    /// Fails if the timer rejects work or does not support periodic
    /// scheduling.
    fn schedule_periodic_at(
        &self,
        first: Time,
        period: Duration,
        thunk: PeriodicThunk,
    ) -> Result<Arc<dyn TimerTask>, TimerError>;

    /// Stops the timer and releases its resources. Pending tasks are
    /// dropped; subsequent scheduling fails.
    fn stop(&self);
}

/// Generic conveniences over any [`Timer`].
pub trait TimerExt: Timer {
    /// Schedules `thunk` to run once after `delay`.
    ///
    /// # Errors
    ///
    /// Fails if the timer rejects work.
    fn schedule_after<F>(&self, delay: Duration, thunk: F) -> Result<Arc<dyn TimerTask>, TimerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_at(self.now() + delay, Box::new(thunk))
    }

    /// Schedules `thunk` periodically, first firing one period from now.
    ///
    /// # Errors
    ///
    /// Fails if the timer rejects work or does not support periodics.
    fn schedule_periodic<F>(
        &self,
        period: Duration,
        thunk: F,
    ) -> Result<Arc<dyn TimerTask>, TimerError>
    where
        F: FnMut() + Send + 'static,
    {
        self.schedule_periodic_at(self.now() + period, period, Box::new(thunk))
    }

    /// Evaluates `f` at `when`, delivering the result as a future.
    ///
    /// Cancelling the returned future cancels the scheduled task; a panic
    /// in `f` becomes a failed result rather than unwinding the timer.
    fn do_at<A, F>(&self, when: Time, f: F) -> Future<A>
    where
        A: Clone + Send + 'static,
        F: FnOnce() -> A + Send + 'static,
    {
        let p = Promise::new();
        let out = p.clone();
        match self.schedule_at(
            when,
            Box::new(move || {
                let _ = out.update_if_empty(Try::from_fn(f));
            }),
        ) {
            Ok(task) => {
                let fut = p.future();
                fut.on_cancellation(move || task.cancel());
                fut
            }
            Err(e) => Future::exception(Error::from(e)),
        }
    }

    /// Evaluates `f` after `delay`, delivering the result as a future.
    fn do_later<A, F>(&self, delay: Duration, f: F) -> Future<A>
    where
        A: Clone + Send + 'static,
        F: FnOnce() -> A + Send + 'static,
    {
        self.do_at(self.now() + delay, f)
    }
}

impl<T: Timer + ?Sized> TimerExt for T {}
