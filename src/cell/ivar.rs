//! Single-assignment cell with a waiter queue and chain flattening.
//!
//! [`Ivar`] is the storage under a promise: empty until set exactly once,
//! with an ordered queue of waiters that each observe the value exactly once.
//! Two additional operations make iterated composition safe:
//!
//! - [`Ivar::chained`] returns a view that observes this cell's fill.
//! - [`Ivar::merge`] unifies two cells so both behave as aliases.
//!
//! Views and merges form a union-find forest: a cell is either a root
//! (empty or full) or a forward pointer to another cell. Every operation
//! walks to the root and compresses the path behind it, so a chain built by
//! N iterations of `flat_map` costs O(1) amortised per link instead of
//! accumulating O(N) forwarding hops.
//!
//! # Locking
//!
//! Each node carries its own lock; operations act under the root's lock
//! after re-validating that the locked node is still a root. `merge` locks
//! the two roots in address order. Waiters are never invoked under a lock:
//! they are handed to the thread-local run queue, which also pins the
//! required ordering (registration order per fill, nested registrations
//! after the current drain).

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::queue;

/// Identity of a registered waiter, used by [`Ivar::unget`].
pub type WaiterKey = u64;

static NEXT_WAITER_KEY: AtomicU64 = AtomicU64::new(1);

fn next_waiter_key() -> WaiterKey {
    NEXT_WAITER_KEY.fetch_add(1, Ordering::Relaxed)
}

/// A single-assignment cell.
///
/// Cloning the handle shares the underlying cell. The value type must be
/// `Clone` because every waiter receives its own copy of the fill.
pub struct Ivar<T> {
    node: Arc<Node<T>>,
}

impl<T> Clone for Ivar<T> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

struct Node<T> {
    state: Mutex<State<T>>,
}

enum State<T> {
    Empty { waiters: Vec<Waiter<T>> },
    Full(T),
    Forward(Arc<Node<T>>),
}

struct Waiter<T> {
    key: WaiterKey,
    run: Box<dyn FnOnce(T) + Send>,
}

impl<T: Clone + Send + 'static> Ivar<T> {
    /// Creates an empty cell.
    #[must_use]
    pub fn new() -> Self {
        Self {
            node: Arc::new(Node {
                state: Mutex::new(State::Empty {
                    waiters: Vec::new(),
                }),
            }),
        }
    }

    /// Creates a cell already holding `value`.
    #[must_use]
    pub fn full(value: T) -> Self {
        Self {
            node: Arc::new(Node {
                state: Mutex::new(State::Full(value)),
            }),
        }
    }

    /// Fills the cell and drains its waiters in registration order.
    ///
    /// Returns false (and does not overwrite) if the cell is already full.
    pub fn set(&self, value: T) -> bool {
        loop {
            let root = Self::find_root(&self.node);
            let drained = {
                let mut st = root.state.lock();
                match &mut *st {
                    State::Forward(_) => continue,
                    State::Full(_) => return false,
                    State::Empty { waiters } => {
                        let drained = std::mem::take(waiters);
                        *st = State::Full(value.clone());
                        drained
                    }
                }
            };
            Self::deliver(drained, &value);
            return true;
        }
    }

    /// Registers a waiter.
    ///
    /// If the cell is already full the waiter runs synchronously on this
    /// thread (or after the current drain, when called from inside one).
    /// The returned key can be passed to [`Ivar::unget`] while the cell is
    /// still empty.
    pub fn get<F>(&self, k: F) -> WaiterKey
    where
        F: FnOnce(T) + Send + 'static,
    {
        let key = next_waiter_key();
        let mut k = Some(k);
        loop {
            let root = Self::find_root(&self.node);
            let ready = {
                let mut st = root.state.lock();
                match &mut *st {
                    State::Forward(_) => continue,
                    State::Full(v) => Some(v.clone()),
                    State::Empty { waiters } => {
                        let run = k.take().expect("waiter registered once");
                        waiters.push(Waiter {
                            key,
                            run: Box::new(run),
                        });
                        None
                    }
                }
            };
            if let Some(v) = ready {
                let run = k.take().expect("waiter registered once");
                queue::submit(move || run(v));
            }
            return key;
        }
    }

    /// Removes a previously registered waiter. No-op once the cell is full.
    pub fn unget(&self, key: WaiterKey) {
        loop {
            let root = Self::find_root(&self.node);
            let mut st = root.state.lock();
            match &mut *st {
                State::Forward(_) => continue,
                State::Full(_) => return,
                State::Empty { waiters } => {
                    waiters.retain(|w| w.key != key);
                    return;
                }
            }
        }
    }

    /// Non-blocking read.
    #[must_use]
    pub fn poll(&self) -> Option<T> {
        loop {
            let root = Self::find_root(&self.node);
            let st = root.state.lock();
            match &*st {
                State::Forward(_) => continue,
                State::Full(v) => return Some(v.clone()),
                State::Empty { .. } => return None,
            }
        }
    }

    /// Returns true if the cell is full.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.poll().is_some()
    }

    /// Blocking read with a deadline. Returns `None` on timeout.
    pub fn wait_for(&self, timeout: Duration) -> Option<T> {
        if let Some(v) = self.poll() {
            return Some(v);
        }
        let slot: Arc<(Mutex<Option<T>>, Condvar)> = Arc::new((Mutex::new(None), Condvar::new()));
        let filled = Arc::clone(&slot);
        let key = self.get(move |v| {
            *filled.0.lock() = Some(v);
            filled.1.notify_all();
        });
        let deadline = Instant::now().checked_add(timeout);
        {
            let mut got = slot.0.lock();
            while got.is_none() {
                match deadline {
                    Some(at) => {
                        if slot.1.wait_until(&mut got, at).timed_out() {
                            break;
                        }
                    }
                    None => slot.1.wait(&mut got),
                }
            }
            if let Some(v) = got.take() {
                return Some(v);
            }
        }
        self.unget(key);
        // The fill may have raced the timeout; prefer the value if it landed.
        let v = slot.0.lock().take();
        v.or_else(|| self.poll())
    }

    /// Unifies this cell with `other` so both behave as aliases.
    ///
    /// If exactly one is full, the other's waiters observe that value. If
    /// both are empty, the root with more waiters wins and the loser
    /// forwards to it. If both are full, neither value changes.
    pub fn merge(&self, other: &Self) {
        loop {
            let a = Self::find_root(&self.node);
            let b = Self::find_root(&other.node);
            if Arc::ptr_eq(&a, &b) {
                return;
            }
            let (first, second) = if Arc::as_ptr(&a).cast::<()>() < Arc::as_ptr(&b).cast::<()>() {
                (a, b)
            } else {
                (b, a)
            };
            let mut g1 = first.state.lock();
            let mut g2 = second.state.lock();
            if matches!(&*g1, State::Forward(_)) || matches!(&*g2, State::Forward(_)) {
                continue;
            }
            let first_full = matches!(&*g1, State::Full(_));
            let second_full = matches!(&*g2, State::Full(_));
            let delivery = match (first_full, second_full) {
                (true, true) => None,
                (true, false) => {
                    let value = match &*g1 {
                        State::Full(v) => v.clone(),
                        _ => unreachable!("checked full"),
                    };
                    let drained = match &mut *g2 {
                        State::Empty { waiters } => std::mem::take(waiters),
                        _ => unreachable!("checked empty"),
                    };
                    *g2 = State::Forward(Arc::clone(&first));
                    Some((drained, value))
                }
                (false, true) => {
                    let value = match &*g2 {
                        State::Full(v) => v.clone(),
                        _ => unreachable!("checked full"),
                    };
                    let drained = match &mut *g1 {
                        State::Empty { waiters } => std::mem::take(waiters),
                        _ => unreachable!("checked empty"),
                    };
                    *g1 = State::Forward(Arc::clone(&second));
                    Some((drained, value))
                }
                (false, false) => {
                    // The root with more waiters wins; the loser's waiters
                    // are appended after the winner's.
                    let first_len = match &*g1 {
                        State::Empty { waiters } => waiters.len(),
                        _ => unreachable!("checked empty"),
                    };
                    let moved = match &mut *g2 {
                        State::Empty { waiters } => std::mem::take(waiters),
                        _ => unreachable!("checked empty"),
                    };
                    if first_len >= moved.len() {
                        match &mut *g1 {
                            State::Empty { waiters } => waiters.extend(moved),
                            _ => unreachable!("checked empty"),
                        }
                        *g2 = State::Forward(Arc::clone(&first));
                    } else {
                        let hand_over = match &mut *g1 {
                            State::Empty { waiters } => std::mem::take(waiters),
                            _ => unreachable!("checked empty"),
                        };
                        let mut kept = moved;
                        kept.extend(hand_over);
                        *g2 = State::Empty { waiters: kept };
                        *g1 = State::Forward(Arc::clone(&second));
                    }
                    None
                }
            };
            drop(g2);
            drop(g1);
            if let Some((waiters, value)) = delivery {
                Self::deliver(waiters, &value);
            }
            return;
        }
    }

    /// Returns a view that observes this cell's fill.
    ///
    /// The view starts as a forward pointer; traversals flatten it, so
    /// chains of views stay O(1) to read through.
    #[must_use]
    pub fn chained(&self) -> Self {
        Self {
            node: Arc::new(Node {
                state: Mutex::new(State::Forward(Arc::clone(&self.node))),
            }),
        }
    }

    /// Number of forwarding hops from this handle to its root, without
    /// compressing. Diagnostic for flatness assertions.
    pub(crate) fn chain_depth(&self) -> usize {
        let mut depth = 0;
        let mut cur = Arc::clone(&self.node);
        loop {
            let next = {
                let st = cur.state.lock();
                match &*st {
                    State::Forward(parent) => Some(Arc::clone(parent)),
                    _ => None,
                }
            };
            match next {
                Some(parent) => {
                    depth += 1;
                    cur = parent;
                }
                None => return depth,
            }
        }
    }

    /// Number of waiters currently registered at the root.
    pub(crate) fn waiter_count(&self) -> usize {
        loop {
            let root = Self::find_root(&self.node);
            let st = root.state.lock();
            match &*st {
                State::Forward(_) => continue,
                State::Full(_) => return 0,
                State::Empty { waiters } => return waiters.len(),
            }
        }
    }

    /// Walks to the root, compressing the path behind it.
    fn find_root(start: &Arc<Node<T>>) -> Arc<Node<T>> {
        let mut cur = Arc::clone(start);
        let mut path: Vec<Arc<Node<T>>> = Vec::new();
        loop {
            let next = {
                let st = cur.state.lock();
                match &*st {
                    State::Forward(parent) => Some(Arc::clone(parent)),
                    _ => None,
                }
            };
            match next {
                Some(parent) => {
                    path.push(cur);
                    cur = parent;
                }
                None => break,
            }
        }
        for visited in path {
            let mut st = visited.state.lock();
            if let State::Forward(parent) = &mut *st {
                if !Arc::ptr_eq(parent, &cur) {
                    *parent = Arc::clone(&cur);
                }
            }
        }
        cur
    }

    /// Hands a drained waiter list to the run queue, one value clone each.
    fn deliver(waiters: Vec<Waiter<T>>, value: &T) {
        if waiters.is_empty() {
            return;
        }
        let mut batch: Vec<Box<dyn FnOnce()>> = Vec::with_capacity(waiters.len());
        for w in waiters {
            let v = value.clone();
            batch.push(Box::new(move || (w.run)(v)));
        }
        queue::submit_all(batch);
    }
}

impl<T: Clone + Send + 'static> Default for Ivar<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug + Clone + Send + 'static> std::fmt::Debug for Ivar<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut d = f.debug_struct("Ivar");
        match self.poll() {
            Some(v) => d.field("value", &v),
            None => d.field("value", &format_args!("<empty>")),
        };
        d.finish()
    }
}
