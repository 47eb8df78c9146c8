//! Deterministic test timer.
//!
//! The mock holds pending entries and a logical clock that only moves when
//! the test calls [`MockTimer::advance`]. [`MockTimer::tick`] partitions
//! entries into fireable and pending, discards cancelled ones, and runs
//! the fireable set in scheduled order. Nothing sleeps and nothing races.
//!
//! Periodic scheduling is not supported. `tick` after `stop` panics:
//! misusing the mock is a test bug and fails loudly.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use super::{PeriodicThunk, Thunk, Timer, TimerTask};
use crate::error::TimerError;
use crate::types::attempt::{capture, Try};
use crate::types::Time;

/// A timer driven entirely by the test.
#[derive(Clone)]
pub struct MockTimer {
    state: Arc<Mutex<MockState>>,
}

struct MockState {
    now: Time,
    stopped: bool,
    next_seq: u64,
    entries: Vec<MockEntry>,
}

struct MockEntry {
    when: Time,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    thunk: Thunk,
}

impl MockTimer {
    /// Creates a mock whose clock starts at [`Time::ZERO`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                now: Time::ZERO,
                stopped: false,
                next_seq: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Moves the logical clock forward. Entries do not fire until the next
    /// [`MockTimer::tick`].
    pub fn advance(&self, d: Duration) {
        let mut s = self.state.lock();
        s.now = s.now + d;
    }

    /// Fires every entry scheduled at or before the logical now, in
    /// scheduled order, and discards cancelled entries.
    ///
    /// # Panics
    ///
    /// Panics if the timer was stopped.
    pub fn tick(&self) {
        let fireable = {
            let mut s = self.state.lock();
            assert!(!s.stopped, "{}", TimerError::Stopped);
            Self::take_fireable(&mut s)
        };
        for entry in fireable {
            if let Try::Throw(e) = capture(entry.thunk) {
                tracing::warn!(error = %e, "mock timer thunk failed");
            }
        }
    }

    /// Number of pending (not yet fireable, not cancelled) entries.
    #[must_use]
    pub fn pending(&self) -> usize {
        let s = self.state.lock();
        s.entries
            .iter()
            .filter(|e| !e.cancelled.load(Ordering::Acquire))
            .count()
    }

    fn take_fireable(s: &mut MockState) -> Vec<MockEntry> {
        let now = s.now;
        let mut fireable = Vec::new();
        let mut pending = Vec::new();
        for entry in s.entries.drain(..) {
            if entry.cancelled.load(Ordering::Acquire) {
                continue;
            }
            if entry.when <= now {
                fireable.push(entry);
            } else {
                pending.push(entry);
            }
        }
        s.entries = pending;
        fireable.sort_by_key(|e| (e.when, e.seq));
        fireable
    }

    /// Drops cancelled entries without firing anything; used by task
    /// cancellation so observers see the removal immediately.
    fn prune(&self) {
        let mut s = self.state.lock();
        if s.stopped {
            return;
        }
        s.entries
            .retain(|e| !e.cancelled.load(Ordering::Acquire));
    }
}

impl Default for MockTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for MockTimer {
    fn now(&self) -> Time {
        self.state.lock().now
    }

    fn schedule_at(&self, when: Time, thunk: Thunk) -> Result<Arc<dyn TimerTask>, TimerError> {
        let cancelled = Arc::new(AtomicBool::new(false));
        {
            let mut s = self.state.lock();
            if s.stopped {
                return Err(TimerError::Stopped);
            }
            let seq = s.next_seq;
            s.next_seq += 1;
            s.entries.push(MockEntry {
                when,
                seq,
                cancelled: Arc::clone(&cancelled),
                thunk,
            });
        }
        Ok(Arc::new(MockTask {
            cancelled,
            timer: Arc::downgrade(&self.state),
        }))
    }

    fn schedule_periodic_at(
        &self,
        _first: Time,
        _period: Duration,
        _thunk: PeriodicThunk,
    ) -> Result<Arc<dyn TimerTask>, TimerError> {
        Err(TimerError::PeriodicUnsupported)
    }

    fn stop(&self) {
        self.state.lock().stopped = true;
    }
}

struct MockTask {
    cancelled: Arc<AtomicBool>,
    timer: Weak<Mutex<MockState>>,
}

impl TimerTask for MockTask {
    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            if let Some(state) = self.timer.upgrade() {
                MockTimer { state }.prune();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;
    use crate::timer::TimerExt;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn tick_fires_due_entries_in_scheduled_order() {
        init_test("tick_fires_due_entries_in_scheduled_order");
        let timer = MockTimer::new();
        let order: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
        for at in [10u64, 20, 30] {
            let order = Arc::clone(&order);
            timer
                .schedule_at(Time::from_millis(at), Box::new(move || order.lock().push(at)))
                .expect("schedule");
        }
        timer.advance(Duration::from_millis(25));
        timer.tick();
        crate::assert_with_log!(
            *order.lock() == vec![10, 20],
            "first two fired in order",
            "[10, 20]",
            format!("{:?}", order.lock())
        );
        crate::assert_with_log!(timer.pending() == 1, "third pending", 1usize, timer.pending());
        crate::test_complete!("tick_fires_due_entries_in_scheduled_order");
    }

    #[test]
    fn nothing_fires_before_tick() {
        init_test("nothing_fires_before_tick");
        let timer = MockTimer::new();
        let hit = Arc::new(AtomicBool::new(false));
        let h = Arc::clone(&hit);
        timer
            .schedule_at(
                Time::from_millis(1),
                Box::new(move || h.store(true, Ordering::SeqCst)),
            )
            .expect("schedule");
        timer.advance(Duration::from_millis(10));
        assert!(!hit.load(Ordering::SeqCst));
        timer.tick();
        assert!(hit.load(Ordering::SeqCst));
        crate::test_complete!("nothing_fires_before_tick");
    }

    #[test]
    fn cancelled_entry_is_removed_immediately() {
        init_test("cancelled_entry_is_removed_immediately");
        let timer = MockTimer::new();
        let task = timer
            .schedule_at(Time::from_millis(10), Box::new(|| {}))
            .expect("schedule");
        assert_eq!(timer.pending(), 1);
        task.cancel();
        assert_eq!(timer.pending(), 0);
        task.cancel();
        assert_eq!(timer.pending(), 0);
        crate::test_complete!("cancelled_entry_is_removed_immediately");
    }

    #[test]
    fn periodic_scheduling_is_unsupported() {
        init_test("periodic_scheduling_is_unsupported");
        let timer = MockTimer::new();
        let rejected =
            timer.schedule_periodic_at(Time::from_millis(1), Duration::from_millis(1), Box::new(|| {}));
        assert_eq!(rejected.err(), Some(TimerError::PeriodicUnsupported));
        crate::test_complete!("periodic_scheduling_is_unsupported");
    }

    #[test]
    #[should_panic(expected = "timer is stopped")]
    fn tick_after_stop_panics() {
        init_test_logging();
        let timer = MockTimer::new();
        timer.stop();
        timer.tick();
    }

    #[test]
    fn stop_rejects_new_entries() {
        init_test("stop_rejects_new_entries");
        let timer = MockTimer::new();
        timer.stop();
        let rejected = timer.schedule_after(Duration::from_millis(1), || {});
        assert_eq!(rejected.err(), Some(TimerError::Stopped));
        crate::test_complete!("stop_rejects_new_entries");
    }
}
