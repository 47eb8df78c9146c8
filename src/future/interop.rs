//! Bridge to the platform-native `std::future::Future`.
//!
//! A [`Future`](crate::future::Future) is callback-based; `async` consumers
//! want to `.await` it. [`ResultFuture`] adapts one to the other: the first
//! poll registers a single waiter that wakes the stored waker, later polls
//! just refresh the waker, and dropping a pending adapter removes the
//! waiter again so abandoned awaits do not pin callbacks on the cell.
//!
//! The adapter resolves to the [`Try`], never panicking on failure; the
//! caller decides how to surface a `Throw`.

use parking_lot::Mutex;
use std::future::IntoFuture;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crate::cell::WaiterKey;
use crate::future::Future;
use crate::types::Try;

/// Awaitable adapter over a [`Future`].
pub struct ResultFuture<A: Clone + Send + 'static> {
    inner: Future<A>,
    registered: Option<Registration>,
}

struct Registration {
    key: WaiterKey,
    waker: Arc<Mutex<Option<Waker>>>,
}

impl<A: Clone + Send + 'static> ResultFuture<A> {
    fn new(inner: Future<A>) -> Self {
        Self {
            inner,
            registered: None,
        }
    }
}

impl<A: Clone + Send + 'static> IntoFuture for Future<A> {
    type Output = Try<A>;
    type IntoFuture = ResultFuture<A>;

    fn into_future(self) -> ResultFuture<A> {
        ResultFuture::new(self)
    }
}

impl<A: Clone + Send + 'static> std::future::Future for ResultFuture<A> {
    type Output = Try<A>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Try<A>> {
        let this = self.get_mut();
        if let Some(t) = this.inner.poll() {
            this.registered = None;
            return Poll::Ready(t);
        }
        match &this.registered {
            Some(reg) => {
                *reg.waker.lock() = Some(cx.waker().clone());
            }
            None => {
                let waker = Arc::new(Mutex::new(Some(cx.waker().clone())));
                let slot = Arc::clone(&waker);
                let key = this.inner.result_waiter(move |_| {
                    if let Some(w) = slot.lock().take() {
                        w.wake();
                    }
                });
                this.registered = Some(Registration { key, waker });
            }
        }
        // The fill may have raced the registration.
        match this.inner.poll() {
            Some(t) => {
                this.registered = None;
                Poll::Ready(t)
            }
            None => Poll::Pending,
        }
    }
}

impl<A: Clone + Send + 'static> Drop for ResultFuture<A> {
    fn drop(&mut self) {
        if let Some(reg) = self.registered.take() {
            self.inner.result_unget(reg.key);
        }
    }
}
