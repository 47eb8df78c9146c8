//! Inline timer: runs everything synchronously.
//!
//! Useful in tests and in wiring where "eventually" is allowed to mean
//! "immediately". A periodic schedule runs its thunk exactly once; there
//! is no thread to keep a cadence on.

use std::sync::Arc;
use std::time::Duration;

use super::{PeriodicThunk, Thunk, Timer, TimerTask};
use crate::error::TimerError;
use crate::types::Time;

/// A timer that runs thunks synchronously on the scheduling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTimer;

impl NullTimer {
    /// Creates the inline timer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

struct NullTask;

impl TimerTask for NullTask {
    fn cancel(&self) {}
}

impl Timer for NullTimer {
    fn schedule_at(&self, _when: Time, thunk: Thunk) -> Result<Arc<dyn TimerTask>, TimerError> {
        thunk();
        Ok(Arc::new(NullTask))
    }

    fn schedule_periodic_at(
        &self,
        _first: Time,
        _period: Duration,
        mut thunk: PeriodicThunk,
    ) -> Result<Arc<dyn TimerTask>, TimerError> {
        thunk();
        Ok(Arc::new(NullTask))
    }

    fn stop(&self) {}
}
