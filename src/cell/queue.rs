//! Thread-local run queue for waiter dispatch.
//!
//! Completing a cell must never invoke user callbacks under the cell lock,
//! and a callback that completes further cells must not grow the stack. Both
//! follow from routing every waiter invocation through this queue: the first
//! submission on a thread drains until empty, and nested submissions enqueue
//! behind whatever the current drain already holds.
//!
//! Consequences, relied on by the cell layer:
//!
//! - Waiters drained by a single `set` run in registration order.
//! - Waiters registered while a drain is in progress run after the drain's
//!   current batch, still in order.
//! - A submission from a thread that is not draining runs synchronously
//!   before `submit` returns.

use std::cell::RefCell;
use std::collections::VecDeque;

type Task = Box<dyn FnOnce()>;

thread_local! {
    static QUEUE: RefCell<VecDeque<Task>> = const { RefCell::new(VecDeque::new()) };
    static DRAINING: RefCell<bool> = const { RefCell::new(false) };
}

/// Submits a single task.
pub(crate) fn submit(task: impl FnOnce() + 'static) {
    submit_all(vec![Box::new(task) as Task]);
}

/// Submits a batch of tasks as one unit.
///
/// The whole batch is enqueued before any of it runs, so tasks registered
/// by an early batch member cannot overtake a later one.
pub(crate) fn submit_all(tasks: Vec<Task>) {
    QUEUE.with(|q| q.borrow_mut().extend(tasks));
    let should_drain = DRAINING.with(|d| {
        let mut d = d.borrow_mut();
        if *d {
            false
        } else {
            *d = true;
            true
        }
    });
    if should_drain {
        // If a task panics, the guard releases the drain flag; whatever is
        // still queued runs on the next submission from this thread.
        let _guard = DrainGuard;
        loop {
            let next = QUEUE.with(|q| q.borrow_mut().pop_front());
            match next {
                Some(task) => task(),
                None => break,
            }
        }
    }
}

struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        DRAINING.with(|d| *d.borrow_mut() = false);
    }
}
