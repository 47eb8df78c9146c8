//! Promissory: composable futures with cancellation propagation and
//! pluggable timers.
//!
//! # Overview
//!
//! Promissory is a callback-based Future/Promise library. A producer holds
//! a [`Promise`] and completes it exactly once; consumers hold [`Future`]
//! views and attach continuations that run exactly once, on whichever
//! thread performs the completion. Combinators compose futures into
//! pipelines, fan-outs, and loops without threads of their own.
//!
//! # Core Guarantees
//!
//! - **Single assignment**: a result is set at most once; late writers are
//!   refused, never raced
//! - **Exactly-once continuations**: every registered waiter observes the
//!   result exactly once, in registration order
//! - **Flat chains**: iterated `flat_map` merges cells with union-find
//!   path compression, so unbounded loops run in constant space and stack
//! - **Cancellation is a signal**: cancelling never completes a result by
//!   itself; it propagates along explicit links to whoever can act on it
//! - **No callback under a lock**: user code never runs while an internal
//!   lock is held
//! - **Timer failures are contained**: a panicking thunk is captured into
//!   a failed result or a log line, never an unwound worker thread
//!
//! # Module Structure
//!
//! - [`types`]: the [`Try`] result sum and [`Time`] instants
//! - [`cell`]: the single-assignment cell ([`cell::Ivar`]) and its
//!   dispatch queue
//! - [`future`]: [`Promise`], [`Future`], transforming combinators, and
//!   the `std::future` bridge
//! - [`combinator`]: aggregate combinators (`join_all`, `collect`,
//!   `select_all`, `times`, `while_do`)
//! - [`cancel`]: the [`Cancellable`] capability
//! - [`timer`]: the [`Timer`] contract and its variants, including the
//!   deterministic [`timer::MockTimer`]
//! - [`locals`]: thread-local context snapshots restored around callbacks
//! - [`error`]: error types
//! - [`test_utils`]: logging and assertion helpers for tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]

pub mod cancel;
pub mod cell;
pub mod combinator;
pub mod error;
pub mod future;
pub mod locals;
pub mod test_utils;
pub mod timer;
pub mod types;

pub use cancel::Cancellable;
pub use combinator::{collect, join_all, select_all, times, while_do};
pub use error::{Error, ErrorKind, TimerError};
pub use future::{Future, Promise};
pub use timer::{
    CountingTimer, MockTimer, NullTimer, PoolTimer, ThreadStoppingTimer, ThreadTimer, Timer,
    TimerExt, TimerTask,
};
pub use types::{Time, Try};
