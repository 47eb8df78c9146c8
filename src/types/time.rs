//! Instants and duration formatting.
//!
//! [`Time`] is a nanosecond-resolution logical timestamp. In production
//! timers it corresponds to wall-clock time (`Time::now`); the mock timer
//! drives it as virtual time, so tests can place instants anywhere on the
//! axis without sleeping.

use core::fmt;
use std::ops::{Add, Sub};
use std::time::{Duration, SystemTime};

/// A logical timestamp, in nanoseconds since the epoch.
///
/// Production timers read this from the wall clock; the mock timer owns a
/// virtual clock that only moves when the test advances it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(u64);

impl Time {
    /// The zero instant (epoch).
    pub const ZERO: Self = Self(0);

    /// The maximum representable instant.
    pub const MAX: Self = Self(u64::MAX);

    /// The current wall-clock time.
    ///
    /// Saturates at zero for clocks set before the epoch.
    #[must_use]
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX));
        Self(nanos)
    }

    /// Creates a time from nanoseconds since epoch.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Creates a time from milliseconds since epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    /// Creates a time from seconds since epoch.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    /// Returns the time as nanoseconds since epoch.
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Returns the time as milliseconds since epoch (truncated).
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0 / 1_000_000
    }

    /// Adds a duration in nanoseconds, saturating on overflow.
    #[must_use]
    pub const fn saturating_add_nanos(self, nanos: u64) -> Self {
        Self(self.0.saturating_add(nanos))
    }

    /// Returns the span from `earlier` to `self`, or zero if `self` is
    /// before `earlier`.
    #[must_use]
    pub const fn duration_since(self, earlier: Self) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Time {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add_nanos(u64::try_from(rhs.as_nanos()).unwrap_or(u64::MAX))
    }
}

impl Sub<Time> for Time {
    type Output = Duration;

    fn sub(self, rhs: Time) -> Duration {
        self.duration_since(rhs)
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Time({}ns)", self.0)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_nanos(self.0, f)
    }
}

/// Wrapper that renders a [`Duration`] in the same human form as [`Time`].
///
/// Used by timeout errors so the failure text names the deadline span.
#[derive(Debug, Clone, Copy)]
pub struct DurationDisplay(pub Duration);

impl fmt::Display for DurationDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_nanos(u64::try_from(self.0.as_nanos()).unwrap_or(u64::MAX), f)
    }
}

fn fmt_nanos(nanos: u64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if nanos >= 1_000_000_000 {
        write!(
            f,
            "{}.{:03}s",
            nanos / 1_000_000_000,
            (nanos / 1_000_000) % 1000
        )
    } else if nanos >= 1_000_000 {
        write!(f, "{}ms", nanos / 1_000_000)
    } else if nanos >= 1_000 {
        write!(f, "{}us", nanos / 1_000)
    } else {
        write!(f, "{}ns", nanos)
    }
}
