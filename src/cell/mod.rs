//! The single-assignment cell and its dispatch queue.
//!
//! [`Ivar`] is the storage primitive under every promise; the private
//! queue module is the thread-local trampoline that runs waiters outside
//! the cell locks.

pub mod ivar;
pub(crate) mod queue;

pub use ivar::{Ivar, WaiterKey};
