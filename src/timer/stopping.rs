//! Stop-from-anywhere timer wrapper.
//!
//! A thunk running on a timer thread cannot call its own timer's `stop`
//! when `stop` joins the worker. This wrapper proxies scheduling untouched
//! and dispatches `stop` to an auxiliary thread, so the caller returns
//! immediately and the join happens off the timer thread.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::{PeriodicThunk, Thunk, Timer, TimerTask};
use crate::error::TimerError;
use crate::types::Time;

/// Proxies a timer, stopping it from an auxiliary thread.
pub struct ThreadStoppingTimer {
    underlying: Arc<dyn Timer>,
}

impl ThreadStoppingTimer {
    /// Wraps `underlying`.
    #[must_use]
    pub fn new(underlying: Arc<dyn Timer>) -> Self {
        Self { underlying }
    }
}

impl Timer for ThreadStoppingTimer {
    fn now(&self) -> Time {
        self.underlying.now()
    }

    fn schedule_at(&self, when: Time, thunk: Thunk) -> Result<Arc<dyn TimerTask>, TimerError> {
        self.underlying.schedule_at(when, thunk)
    }

    fn schedule_periodic_at(
        &self,
        first: Time,
        period: Duration,
        thunk: PeriodicThunk,
    ) -> Result<Arc<dyn TimerTask>, TimerError> {
        self.underlying.schedule_periodic_at(first, period, thunk)
    }

    fn stop(&self) {
        let target = Arc::clone(&self.underlying);
        let spawned = thread::Builder::new()
            .name("promissory-timer-stop".into())
            .spawn(move || target.stop());
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "failed to spawn stop thread; stopping inline");
            self.underlying.stop();
        }
    }
}
