//! Futures, promises, and their combinators.
//!
//! - [`promise`]: the [`Promise`]/[`Future`] pair and the transforming
//!   combinators (`map`, `flat_map`, `rescue`, `filter`, `within`, ...)
//! - [`interop`]: the bridge to `std::future::Future` for `.await` use
//!
//! Continuations attach with [`Future::respond`] and run on whichever
//! thread completes the promise; see the crate docs for the dispatch and
//! cancellation model.

pub mod interop;
pub mod promise;

pub use interop::ResultFuture;
pub use promise::{Future, Promise};
