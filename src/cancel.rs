//! Cancellation capability.
//!
//! Cancellation is a signal, not an error: cancelling a future marks its
//! cancelled cell and notifies linked parties, but never completes the
//! result by itself. Whoever owns the producing side decides whether to
//! observe the signal and complete with a failure.
//!
//! Links are directed waiter edges: `a.link_to(b)` means cancelling `a`
//! also cancels `b`. The relation is not symmetric and is not materialised
//! as a graph; each link is one waiter on the source's cancelled cell.
//! Cycles only cost idempotent repeated `cancel` calls.

/// An operation that can be cancelled.
pub trait Cancellable {
    /// Requests cancellation. Idempotent; late calls are no-ops.
    fn cancel(&self);

    /// Returns true if cancellation has been requested.
    fn is_cancelled(&self) -> bool;
}

impl<C: Cancellable + ?Sized> Cancellable for std::sync::Arc<C> {
    fn cancel(&self) {
        (**self).cancel();
    }

    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}
