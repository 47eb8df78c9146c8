//! Select combinator: first completion wins, remainder returned.
//!
//! `select_all(fs)` completes with the first arriving result (success or
//! failure) paired with the still-pending inputs in their original order,
//! winner excluded. Losers are not cancelled; the caller owns them and
//! decides whether to keep waiting, retry, or cancel.
//!
//! # Cancellation
//!
//! The output is linked to every input, so cancelling it before a winner
//! arrives cancels all of them.

use crate::error::Error;
use crate::future::{Future, Promise};
use crate::types::Try;

/// Completes with the first result and the remaining futures.
#[must_use]
pub fn select_all<A>(futures: Vec<Future<A>>) -> Future<(Try<A>, Vec<Future<A>>)>
where
    A: Clone + Send + 'static,
{
    if futures.is_empty() {
        return Future::exception(Error::user("select_all requires at least one future"));
    }
    let p = Promise::new();
    let out_future = p.future();
    for (i, f) in futures.iter().enumerate() {
        let out = p.clone();
        let all = futures.clone();
        f.respond(move |t| {
            let mut rest = all;
            rest.remove(i);
            let _ = out.update_if_empty(Try::Return((t, rest)));
        });
        out_future.link_to(f.clone());
    }
    out_future
}
