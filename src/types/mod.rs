//! Core value types.
//!
//! - [`attempt`]: the [`Try`] success/failure sum stored in completed cells
//! - [`time`]: the [`Time`] instant type and duration formatting
//!
//! [`Try`]: attempt::Try
//! [`Time`]: time::Time

pub mod attempt;
pub mod time;

pub use attempt::Try;
pub use time::{DurationDisplay, Time};
