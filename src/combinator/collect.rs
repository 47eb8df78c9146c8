//! Collect combinator: gather every value in input order.
//!
//! `collect(fs)` completes with the values of `fs` in their original
//! positions once all succeed, regardless of completion order. The first
//! failure to arrive completes the output with that failure.
//!
//! # Cancellation
//!
//! The output future is linked to every input: cancelling it cancels them
//! all. Inputs are never cancelled by a sibling's failure; whoever holds
//! the output decides.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::future::{Future, Promise};
use crate::types::Try;

/// Completes with all values in input order, or the first failure.
#[must_use]
pub fn collect<A>(futures: Vec<Future<A>>) -> Future<Vec<A>>
where
    A: Clone + Send + 'static,
{
    if futures.is_empty() {
        return Future::value(Vec::new());
    }
    let p = Promise::new();
    let n = futures.len();
    let slots: Arc<Mutex<Vec<Option<A>>>> = Arc::new(Mutex::new(vec![None; n]));
    let remaining = Arc::new(AtomicUsize::new(n));
    let out_future = p.future();
    for (i, f) in futures.iter().enumerate() {
        let out = p.clone();
        let slots = Arc::clone(&slots);
        let remaining = Arc::clone(&remaining);
        f.respond(move |t| match t {
            Try::Return(a) => {
                slots.lock()[i] = Some(a);
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    let values: Vec<A> = slots
                        .lock()
                        .iter_mut()
                        .map(|s| s.take().expect("slot filled before last arrival"))
                        .collect();
                    let _ = out.update_if_empty(Try::Return(values));
                }
            }
            Try::Throw(e) => {
                let _ = out.update_if_empty(Try::Throw(e));
            }
        });
        out_future.link_to(f.clone());
    }
    out_future
}
