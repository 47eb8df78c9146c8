//! Thread-local context carried across callback boundaries.
//!
//! A continuation registered on a future may run on whichever thread
//! completes it. Code that keeps request-scoped state in thread-locals would
//! silently lose that state at the hop. [`Local`] is a keyed thread-local
//! slot whose whole bundle can be captured with [`save`] and reinstated with
//! [`restore`]; `respond` captures a snapshot at registration time and the
//! dispatch path restores it around the callback.
//!
//! The key set is open: any host subsystem may create its own [`Local`]
//! keys, and snapshots carry all of them.

use std::any::Any;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Slot = Option<Arc<dyn Any + Send + Sync>>;

thread_local! {
    static BUNDLE: RefCell<Vec<Slot>> = const { RefCell::new(Vec::new()) };
}

static NEXT_INDEX: AtomicUsize = AtomicUsize::new(0);

/// A keyed slot in the thread-local bundle.
///
/// Each `Local` owns a process-wide index; reads and writes touch only the
/// current thread's bundle.
pub struct Local<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Local<T> {
    /// Allocates a new key.
    #[must_use]
    pub fn new() -> Self {
        Self {
            index: NEXT_INDEX.fetch_add(1, Ordering::Relaxed),
            _marker: PhantomData,
        }
    }

    /// Sets this slot on the current thread.
    pub fn set(&self, value: T) {
        BUNDLE.with(|b| {
            let mut bundle = b.borrow_mut();
            if bundle.len() <= self.index {
                bundle.resize_with(self.index + 1, || None);
            }
            bundle[self.index] = Some(Arc::new(value));
        });
    }

    /// Reads this slot on the current thread.
    #[must_use]
    pub fn get(&self) -> Option<Arc<T>> {
        BUNDLE.with(|b| {
            b.borrow()
                .get(self.index)
                .and_then(Clone::clone)
                .and_then(|any| any.downcast::<T>().ok())
        })
    }

    /// Clears this slot on the current thread.
    pub fn clear(&self) {
        BUNDLE.with(|b| {
            let mut bundle = b.borrow_mut();
            if let Some(slot) = bundle.get_mut(self.index) {
                *slot = None;
            }
        });
    }

    /// Runs `f` with this slot set to `value`, restoring the prior value
    /// afterwards (also on panic-free early return paths).
    pub fn bind<R>(&self, value: T, f: impl FnOnce() -> R) -> R {
        let saved = self.get();
        self.set(value);
        let out = f();
        match saved {
            Some(prior) => BUNDLE.with(|b| {
                let mut bundle = b.borrow_mut();
                if bundle.len() <= self.index {
                    bundle.resize_with(self.index + 1, || None);
                }
                bundle[self.index] = Some(prior);
            }),
            None => self.clear(),
        }
        out
    }
}

impl<T: Send + Sync + 'static> Default for Local<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A captured copy of the current thread's bundle.
#[derive(Clone, Default)]
pub struct Snapshot {
    slots: Vec<Slot>,
}

/// Captures the current thread's bundle.
#[must_use]
pub fn save() -> Snapshot {
    Snapshot {
        slots: BUNDLE.with(|b| b.borrow().clone()),
    }
}

/// Replaces the current thread's bundle with a snapshot.
pub fn restore(snapshot: &Snapshot) {
    BUNDLE.with(|b| *b.borrow_mut() = snapshot.slots.clone());
}

/// Runs `f` under `snapshot`, reinstating the caller's bundle afterwards.
pub(crate) fn with_snapshot<R>(snapshot: &Snapshot, f: impl FnOnce() -> R) -> R {
    let prior = save();
    restore(snapshot);
    let out = f();
    restore(&prior);
    out
}
