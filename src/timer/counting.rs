//! Reference-counting timer wrapper.
//!
//! Holds a factory for the underlying timer and constructs it lazily on
//! the first [`CountingTimer::acquire`]; each `stop` releases one
//! acquisition and the underlying timer is stopped when the count returns
//! to zero. Construction happens only on 0→1 transitions and destruction
//! only on 1→0 transitions, never both in one call.
//!
//! A `stop` without a matching `acquire` is a warned no-op.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use super::{PeriodicThunk, Thunk, Timer, TimerTask};
use crate::error::TimerError;
use crate::types::Time;

/// Shares one lazily constructed timer among reference-counted users.
pub struct CountingTimer {
    factory: Box<dyn Fn() -> Arc<dyn Timer> + Send + Sync>,
    state: Mutex<CountingState>,
}

struct CountingState {
    acquisitions: usize,
    underlying: Option<Arc<dyn Timer>>,
}

impl CountingTimer {
    /// Wraps `factory`; nothing is constructed until the first `acquire`.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Timer> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            state: Mutex::new(CountingState {
                acquisitions: 0,
                underlying: None,
            }),
        }
    }

    /// Takes a reference on the underlying timer, constructing it if this
    /// is the first acquisition.
    pub fn acquire(&self) {
        let mut s = self.state.lock();
        if s.acquisitions == 0 {
            s.underlying = Some((self.factory)());
        }
        s.acquisitions += 1;
    }

    fn underlying(&self) -> Result<Arc<dyn Timer>, TimerError> {
        self.state
            .lock()
            .underlying
            .clone()
            .ok_or(TimerError::NotAcquired)
    }
}

impl Timer for CountingTimer {
    fn now(&self) -> Time {
        self.underlying().map_or_else(|_| Time::now(), |t| t.now())
    }

    fn schedule_at(&self, when: Time, thunk: Thunk) -> Result<Arc<dyn TimerTask>, TimerError> {
        self.underlying()?.schedule_at(when, thunk)
    }

    fn schedule_periodic_at(
        &self,
        first: Time,
        period: Duration,
        thunk: PeriodicThunk,
    ) -> Result<Arc<dyn TimerTask>, TimerError> {
        self.underlying()?.schedule_periodic_at(first, period, thunk)
    }

    fn stop(&self) {
        let to_stop = {
            let mut s = self.state.lock();
            match s.acquisitions {
                0 => {
                    tracing::warn!("timer stop without a matching acquire; ignoring");
                    None
                }
                1 => {
                    s.acquisitions = 0;
                    s.underlying.take()
                }
                n => {
                    s.acquisitions = n - 1;
                    None
                }
            }
        };
        if let Some(timer) = to_stop {
            timer.stop();
        }
    }
}
