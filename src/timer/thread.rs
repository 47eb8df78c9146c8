//! Single background-thread timer.
//!
//! One worker thread sleeps on a heap of pending entries and fires them as
//! their instants arrive. Periodic schedules use **fixed-delay** semantics:
//! the next fire is measured from the completion of the previous run, so a
//! slow thunk pushes its own cadence back rather than bursting to catch up.
//!
//! Cancellation is best-effort and lazy: a cancelled entry stays in the
//! heap until the worker pops it, then is skipped. `stop` drains the heap,
//! wakes the worker, and joins it; when called from the worker thread
//! itself the join is skipped and the thread exits on its own (see
//! [`ThreadStoppingTimer`](crate::timer::ThreadStoppingTimer) for the
//! general pattern).

use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::{PeriodicThunk, Thunk, Timer, TimerTask};
use crate::error::TimerError;
use crate::types::attempt::{capture, Try};
use crate::types::Time;

/// A timer backed by one background thread.
pub struct ThreadTimer {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    state: Mutex<Queue>,
    tick: Condvar,
}

struct Queue {
    entries: BinaryHeap<Entry>,
    next_seq: u64,
    stopped: bool,
}

struct Entry {
    when: Time,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    kind: EntryKind,
}

enum EntryKind {
    Once(Thunk),
    Periodic { period: Duration, thunk: PeriodicThunk },
}

// Min-heap on (when, seq): earliest instant first, insertion order on ties.
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.when == other.when && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .when
            .cmp(&self.when)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl ThreadTimer {
    /// Starts the worker thread.
    #[must_use]
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(Queue {
                entries: BinaryHeap::new(),
                next_seq: 0,
                stopped: false,
            }),
            tick: Condvar::new(),
        });
        let for_worker = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("promissory-timer".into())
            .spawn(move || worker_loop(&for_worker))
            .expect("failed to spawn timer thread");
        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    fn push(&self, when: Time, kind: EntryKind) -> Result<Arc<dyn TimerTask>, TimerError> {
        let cancelled = Arc::new(AtomicBool::new(false));
        {
            let mut q = self.shared.state.lock();
            if q.stopped {
                return Err(TimerError::Stopped);
            }
            let seq = q.next_seq;
            q.next_seq += 1;
            q.entries.push(Entry {
                when,
                seq,
                cancelled: Arc::clone(&cancelled),
                kind,
            });
        }
        self.shared.tick.notify_one();
        Ok(Arc::new(ThreadTask {
            cancelled,
            shared: Arc::downgrade(&self.shared),
        }))
    }
}

impl Default for ThreadTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for ThreadTimer {
    fn schedule_at(&self, when: Time, thunk: Thunk) -> Result<Arc<dyn TimerTask>, TimerError> {
        self.push(when, EntryKind::Once(thunk))
    }

    fn schedule_periodic_at(
        &self,
        first: Time,
        period: Duration,
        thunk: PeriodicThunk,
    ) -> Result<Arc<dyn TimerTask>, TimerError> {
        self.push(first, EntryKind::Periodic { period, thunk })
    }

    fn stop(&self) {
        {
            let mut q = self.shared.state.lock();
            q.stopped = true;
            q.entries.clear();
        }
        self.shared.tick.notify_all();
        let handle = self.worker.lock().take();
        if let Some(h) = handle {
            if h.thread().id() == thread::current().id() {
                tracing::debug!("timer stopped from its own thread; skipping join");
            } else {
                let _ = h.join();
            }
        }
    }
}

struct ThreadTask {
    cancelled: Arc<AtomicBool>,
    shared: std::sync::Weak<Shared>,
}

impl TimerTask for ThreadTask {
    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            if let Some(shared) = self.shared.upgrade() {
                shared.tick.notify_all();
            }
        }
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let entry = {
            let mut q = shared.state.lock();
            loop {
                if q.stopped {
                    return;
                }
                match q.entries.peek().map(|e| e.when) {
                    None => shared.tick.wait(&mut q),
                    Some(when) => {
                        let now = Time::now();
                        if when <= now {
                            break q.entries.pop().expect("peeked entry present");
                        }
                        let _ = shared.tick.wait_for(&mut q, when - now);
                    }
                }
            }
        };
        if entry.cancelled.load(Ordering::Acquire) {
            continue;
        }
        match entry.kind {
            EntryKind::Once(thunk) => run_thunk(thunk),
            EntryKind::Periodic { period, mut thunk } => {
                if let Try::Throw(e) = capture(|| thunk()) {
                    tracing::warn!(error = %e, "periodic timer thunk failed");
                }
                // Fixed delay: measure the next fire from completion.
                let mut q = shared.state.lock();
                if !q.stopped && !entry.cancelled.load(Ordering::Acquire) {
                    let seq = q.next_seq;
                    q.next_seq += 1;
                    q.entries.push(Entry {
                        when: Time::now() + period,
                        seq,
                        cancelled: entry.cancelled,
                        kind: EntryKind::Periodic { period, thunk },
                    });
                }
            }
        }
    }
}

fn run_thunk(thunk: Thunk) {
    if let Try::Throw(e) = capture(thunk) {
        tracing::warn!(error = %e, "timer thunk failed");
    }
}
