//! Thread-pool timer.
//!
//! A fixed pool of workers shares one heap of pending entries, so a thunk
//! that runs long delays only the worker it occupies; other due entries
//! keep firing on the rest of the pool. Periodic schedules use
//! **fixed-rate** semantics: the next fire is measured from the scheduled
//! instant, not from completion, and a cadence that falls behind is merged
//! forward to the current instant rather than bursting to catch up.

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

/// A timer backed by a pool of worker threads.
pub struct PoolTimer {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
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
    Periodic {
        period: Duration,
        thunk: Arc<Mutex<PeriodicThunk>>,
    },
}

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

impl PoolTimer {
    /// Starts a pool of `threads` workers.
    ///
    /// # Panics
    ///
    /// Panics if `threads` is zero.
    #[must_use]
    pub fn new(threads: usize) -> Self {
        assert!(threads > 0, "pool timer needs at least one thread");
        let shared = Arc::new(Shared {
            state: Mutex::new(Queue {
                entries: BinaryHeap::new(),
                next_seq: 0,
                stopped: false,
            }),
            tick: Condvar::new(),
        });
        let workers = (0..threads)
            .map(|i| {
                let for_worker = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("promissory-pool-{i}"))
                    .spawn(move || worker_loop(&for_worker))
                    .expect("failed to spawn pool timer thread")
            })
            .collect();
        Self {
            shared,
            workers: Mutex::new(workers),
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
        Ok(Arc::new(PoolTask {
            cancelled,
            shared: Arc::downgrade(&self.shared),
        }))
    }
}

impl Timer for PoolTimer {
    fn schedule_at(&self, when: Time, thunk: Thunk) -> Result<Arc<dyn TimerTask>, TimerError> {
        self.push(when, EntryKind::Once(thunk))
    }

    fn schedule_periodic_at(
        &self,
        first: Time,
        period: Duration,
        thunk: PeriodicThunk,
    ) -> Result<Arc<dyn TimerTask>, TimerError> {
        self.push(
            first,
            EntryKind::Periodic {
                period,
                thunk: Arc::new(Mutex::new(thunk)),
            },
        )
    }

    fn stop(&self) {
        {
            let mut q = self.shared.state.lock();
            q.stopped = true;
            q.entries.clear();
        }
        self.shared.tick.notify_all();
        let handles = std::mem::take(&mut *self.workers.lock());
        let me = thread::current().id();
        for h in handles {
            if h.thread().id() == me {
                tracing::debug!("pool timer stopped from one of its own threads; skipping join");
            } else {
                let _ = h.join();
            }
        }
    }
}

struct PoolTask {
    cancelled: Arc<AtomicBool>,
    shared: std::sync::Weak<Shared>,
}

impl TimerTask for PoolTask {
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
            EntryKind::Once(thunk) => {
                if let Try::Throw(e) = capture(thunk) {
                    tracing::warn!(error = %e, "pool timer thunk failed");
                }
            }
            EntryKind::Periodic { period, thunk } => {
                // Fixed rate, merged forward: reinsert before running so a
                // long thunk does not hold up the next fire on another
                // worker; the thunk lock keeps a single run at a time.
                let scheduled_next = entry.when + period;
                let next = scheduled_next.max(Time::now());
                {
                    let mut q = shared.state.lock();
                    if !q.stopped && !entry.cancelled.load(Ordering::Acquire) {
                        let seq = q.next_seq;
                        q.next_seq += 1;
                        q.entries.push(Entry {
                            when: next,
                            seq,
                            cancelled: Arc::clone(&entry.cancelled),
                            kind: EntryKind::Periodic {
                                period,
                                thunk: Arc::clone(&thunk),
                            },
                        });
                    }
                }
                shared.tick.notify_one();
                let mut run = thunk.lock();
                if let Try::Throw(e) = capture(|| (*run)()) {
                    tracing::warn!(error = %e, "periodic pool timer thunk failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;
    use crate::timer::TimerExt;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn long_thunk_does_not_block_other_fires() {
        init_test_logging();
        let timer = PoolTimer::new(2);
        let hits = Arc::new(AtomicUsize::new(0));
        timer
            .schedule_after(Duration::from_millis(5), || {
                thread::sleep(Duration::from_millis(150));
            })
            .expect("schedule blocker");
        let h = Arc::clone(&hits);
        timer
            .schedule_after(Duration::from_millis(20), move || {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .expect("schedule fast task");
        thread::sleep(Duration::from_millis(90));
        assert_eq!(
            hits.load(Ordering::SeqCst),
            1,
            "fast task should fire while the blocker sleeps"
        );
        timer.stop();
    }

    #[test]
    fn periodic_keeps_cadence_until_cancelled() {
        init_test_logging();
        let timer = PoolTimer::new(2);
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let task = timer
            .schedule_periodic(Duration::from_millis(10), move || {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .expect("schedule periodic");
        thread::sleep(Duration::from_millis(150));
        task.cancel();
        assert!(hits.load(Ordering::SeqCst) >= 2);
        timer.stop();
    }

    #[test]
    fn stop_joins_all_workers_and_rejects_work() {
        init_test_logging();
        let timer = PoolTimer::new(3);
        timer.stop();
        let rejected = timer.schedule_after(Duration::from_millis(1), || {});
        assert_eq!(rejected.err(), Some(TimerError::Stopped));
    }
}
