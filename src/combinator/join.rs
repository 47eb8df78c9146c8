//! Join combinator: wait for every future to succeed.
//!
//! `join_all(fs)` completes with unit once every input has succeeded; the
//! first failure to arrive completes the output with that failure without
//! waiting for the rest.
//!
//! # Cancellation
//!
//! The output is linked to every input, so cancelling it cancels all of
//! them. A failing sibling never cancels the others by itself.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::future::{Future, Promise};
use crate::types::Try;

/// Completes with unit once all inputs succeed, or with the first failure.
#[must_use]
pub fn join_all<A>(futures: Vec<Future<A>>) -> Future<()>
where
    A: Clone + Send + 'static,
{
    if futures.is_empty() {
        return Future::unit();
    }
    let p = Promise::new();
    let remaining = Arc::new(AtomicUsize::new(futures.len()));
    let out_future = p.future();
    for f in &futures {
        let out = p.clone();
        let remaining = Arc::clone(&remaining);
        f.respond(move |t| match t {
            Try::Return(_) => {
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    let _ = out.update_if_empty(Try::Return(()));
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
