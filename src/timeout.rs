// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeouts for blocking acquisitions.
//!
//! A [`Timeout`] bounds how long an acquisition may block. Two values are
//! reserved: [`Timeout::FOREVER`] blocks until the lock is granted and
//! [`Timeout::NO_WAIT`] makes a single attempt and returns immediately.
//!
//! RTOS code usually counts in scheduler ticks, so conversions to and from
//! tick counts are provided. `u32::MAX` ticks means "wait forever".

use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// Tick count that means "wait forever".
pub const WAIT_FOREVER_TICKS: u32 = u32::MAX;

/// An upper bound on how long an acquisition may block.
///
/// # Examples
///
/// ```
/// use rtos_rwlock::Timeout;
/// use std::time::Duration;
///
/// assert!(Timeout::FOREVER.is_forever());
/// assert!(Timeout::NO_WAIT.is_no_wait());
///
/// let t = Timeout::from_millis(25);
/// assert_eq!(t.as_duration(), Some(Duration::from_millis(25)));
/// assert_eq!(t.to_ticks(1000), 25);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timeout(Option<Duration>);

impl Timeout {
    /// Block until the acquisition succeeds.
    pub const FOREVER: Timeout = Timeout(None);
    /// Try exactly once without blocking.
    pub const NO_WAIT: Timeout = Timeout(Some(Duration::ZERO));

    /// Creates a timeout from an optional duration; `None` waits forever.
    pub const fn new(duration: Option<Duration>) -> Self {
        Timeout(duration)
    }

    /// Creates a bounded timeout.
    pub const fn from_duration(duration: Duration) -> Self {
        Timeout(Some(duration))
    }

    /// Creates a bounded timeout in milliseconds.
    pub const fn from_millis(ms: u64) -> Self {
        Timeout(Some(Duration::from_millis(ms)))
    }

    /// Converts a tick count at `tick_rate_hz` into a timeout.
    ///
    /// [`WAIT_FOREVER_TICKS`] maps to [`Timeout::FOREVER`] and `0` maps to
    /// [`Timeout::NO_WAIT`]. A tick rate of zero is treated as 1 Hz.
    ///
    /// ```
    /// use rtos_rwlock::Timeout;
    ///
    /// assert_eq!(Timeout::from_ticks(u32::MAX, 1000), Timeout::FOREVER);
    /// assert_eq!(Timeout::from_ticks(0, 1000), Timeout::NO_WAIT);
    /// assert_eq!(Timeout::from_ticks(50, 100), Timeout::from_millis(500));
    /// ```
    pub fn from_ticks(ticks: u32, tick_rate_hz: u32) -> Self {
        if ticks == WAIT_FOREVER_TICKS {
            return Timeout::FOREVER;
        }
        let rate = u64::from(tick_rate_hz.max(1));
        let micros = u64::from(ticks) * 1_000_000 / rate;
        Timeout(Some(Duration::from_micros(micros)))
    }

    /// Converts this timeout into ticks at `tick_rate_hz`, rounding up.
    ///
    /// Bounded timeouts saturate one below [`WAIT_FOREVER_TICKS`] so a long
    /// finite wait never turns into an infinite one.
    pub fn to_ticks(self, tick_rate_hz: u32) -> u32 {
        let Some(duration) = self.0 else {
            return WAIT_FOREVER_TICKS;
        };
        let rate = u128::from(tick_rate_hz.max(1));
        let ticks = (duration.as_nanos() * rate).div_ceil(1_000_000_000);
        u32::try_from(ticks)
            .unwrap_or(WAIT_FOREVER_TICKS - 1)
            .min(WAIT_FOREVER_TICKS - 1)
    }

    /// The bound, or `None` when waiting forever.
    pub const fn as_duration(self) -> Option<Duration> {
        self.0
    }

    pub const fn is_forever(self) -> bool {
        self.0.is_none()
    }

    pub fn is_no_wait(self) -> bool {
        self.0 == Some(Duration::ZERO)
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Timeout(Some(duration))
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(duration: Option<Duration>) -> Self {
        Timeout(duration)
    }
}

impl std::fmt::Display for Timeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            None => write!(f, "forever"),
            Some(d) if d.is_zero() => write!(f, "no wait"),
            Some(d) => write!(f, "{:?}", d),
        }
    }
}

/// A fixed point in time by which an operation must finish.
///
/// One deadline is computed at the start of a multi-step acquisition so each
/// step only gets what is left of the caller's budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Deadline(Option<Instant>);

impl Deadline {
    pub(crate) fn after(timeout: Timeout) -> Self {
        // An unrepresentable instant is as good as forever.
        Deadline(
            timeout
                .as_duration()
                .and_then(|d| Instant::now().checked_add(d)),
        )
    }

    pub(crate) fn instant(self) -> Option<Instant> {
        self.0
    }

    pub(crate) fn expired(self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }

    /// What is left of the budget.
    pub(crate) fn remaining(self) -> Timeout {
        match self.0 {
            None => Timeout::FOREVER,
            Some(at) => Timeout(Some(at.saturating_duration_since(Instant::now()))),
        }
    }
}
