//! Iterative composition: repeat an asynchronous body.
//!
//! `times(n, f)` runs `f` to completion `n` times in sequence; `while_do`
//! keeps going while a predicate holds. Each round is one `flat_map`
//! stage, so these loops are the canonical exercise of chain merging: the
//! round count does not grow the waiter graph or the stack.

use std::sync::Arc;

use crate::future::Future;

/// Runs `f` to completion `n` times in sequence.
#[must_use]
pub fn times<F>(n: usize, f: F) -> Future<()>
where
    F: Fn() -> Future<()> + Send + Sync + 'static,
{
    times_loop(n, Arc::new(f))
}

fn times_loop<F>(remaining: usize, f: Arc<F>) -> Future<()>
where
    F: Fn() -> Future<()> + Send + Sync + 'static,
{
    if remaining == 0 {
        return Future::unit();
    }
    f().flat_map(move |()| times_loop(remaining - 1, f))
}

/// Runs `f` to completion while `pred` holds.
///
/// The predicate is evaluated before every round, including the first.
#[must_use]
pub fn while_do<P, F>(pred: P, f: F) -> Future<()>
where
    P: Fn() -> bool + Send + Sync + 'static,
    F: Fn() -> Future<()> + Send + Sync + 'static,
{
    while_loop(Arc::new(pred), Arc::new(f))
}

fn while_loop<P, F>(pred: Arc<P>, f: Arc<F>) -> Future<()>
where
    P: Fn() -> bool + Send + Sync + 'static,
    F: Fn() -> Future<()> + Send + Sync + 'static,
{
    if !pred() {
        return Future::unit();
    }
    f().flat_map(move |()| while_loop(pred, f))
}
