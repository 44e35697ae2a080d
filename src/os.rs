// SPDX-License-Identifier: MIT OR Apache-2.0
//! The OS abstraction layer: named, timeout-bounded mutexes and semaphores.
//!
//! The reader-writer lock does not implement blocking itself. It consumes two
//! capabilities, an exclusive lock and a binary gate, through the
//! [`RawLock`] trait, and obtains them from a [`Primitives`] factory. This
//! module supplies the native implementation of both:
//!
//! - [`Mutex`]: exclusive lock with `get` / `put`
//! - [`Semaphore`]: binary or counting semaphore with `get` / `put` / `count`
//! - [`Os`]: the factory, optionally limited to a fixed number of live handles
//!
//! Every blocking call takes a [`Timeout`]. Threads park while they wait;
//! where a thread may not block (the browser main thread on `wasm32`) they
//! spin. Each primitive also offers an async acquisition that never blocks the
//! executor.
//!
//! # Examples
//!
//! ```
//! use rtos_rwlock::os::{Os, OsConfig};
//! use rtos_rwlock::{Error, Timeout};
//!
//! let os = Os::new(OsConfig::new().with_max_handles(2));
//! let mutex = os.create_mutex("net_mutex").unwrap();
//! let sem = os.create_semaphore("net_sem").unwrap();
//! assert_eq!(os.live_handles(), 2);
//!
//! // The budget is spent.
//! assert!(matches!(os.create_mutex("extra"), Err(Error::Resource(_))));
//!
//! // Deleting a primitive returns its handle.
//! drop(sem);
//! assert_eq!(os.live_handles(), 1);
//!
//! mutex.get(Timeout::NO_WAIT).unwrap();
//! mutex.put().unwrap();
//! ```

mod acquire;
mod handles;
mod mutex;
mod not_available;
mod semaphore;
mod wait_list;


pub use mutex::Mutex;
pub use not_available::NotAvailable;
pub use semaphore::Semaphore;

use crate::timeout::Timeout;
use crate::Error;
use handles::HandleBudget;
use std::future::Future;
use std::sync::Arc;

/// Scheduler tick rate assumed when none is configured.
pub const DEFAULT_TICK_RATE_HZ: u32 = 1000;

/// A lock that can be taken with a timeout and given back by a separate call.
///
/// Destroying the primitive is dropping it. Dropping while another thread is
/// blocked on it is a caller error.
pub trait RawLock: Send + Sync {
    /// Takes the lock, blocking for at most `timeout`.
    ///
    /// Fails with [`Error::Timeout`] and no side effects if the lock was not
    /// granted in time.
    fn acquire(&self, timeout: Timeout) -> Result<(), Error>;

    /// Takes the lock without blocking the executor.
    fn acquire_async(&self, timeout: Timeout) -> impl Future<Output = Result<(), Error>> + '_;

    /// Gives the lock back. Fails with [`Error::InvalidState`] if it was not held.
    fn release(&self) -> Result<(), Error>;
}

/// Factory for the primitives a [`RwLock`](crate::RwLock) is built from.
///
/// Implement this to run the lock on top of another OS layer.
pub trait Primitives {
    /// Exclusive lock used for the reader-count section and writer exclusion.
    type Mutex: RawLock;
    /// Binary gate, created free, shared between "readers active" and "writer active".
    type Gate: RawLock;

    fn create_mutex(&self, name: &str) -> Result<Self::Mutex, Error>;
    fn create_gate(&self, name: &str) -> Result<Self::Gate, Error>;
}

/// Configuration of an [`Os`].
///
/// ```
/// use rtos_rwlock::os::OsConfig;
///
/// let config = OsConfig::new().with_max_handles(16).with_tick_rate_hz(100);
/// assert_eq!(config.max_handles(), Some(16));
/// assert_eq!(config.ticks(25), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsConfig {
    max_handles: Option<usize>,
    tick_rate_hz: u32,
}

impl OsConfig {
    /// Unlimited handles at [`DEFAULT_TICK_RATE_HZ`].
    pub const fn new() -> Self {
        OsConfig {
            max_handles: None,
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
        }
    }

    /// Limits how many primitives may be alive at once.
    pub const fn with_max_handles(mut self, max_handles: usize) -> Self {
        self.max_handles = Some(max_handles);
        self
    }

    /// Sets the scheduler tick rate used for tick conversions.
    pub const fn with_tick_rate_hz(mut self, tick_rate_hz: u32) -> Self {
        self.tick_rate_hz = tick_rate_hz;
        self
    }

    pub const fn max_handles(&self) -> Option<usize> {
        self.max_handles
    }

    pub const fn tick_rate_hz(&self) -> u32 {
        self.tick_rate_hz
    }

    /// Milliseconds to ticks at the configured rate, rounding up.
    pub fn ticks(&self, ms: u64) -> u32 {
        Timeout::from_millis(ms).to_ticks(self.tick_rate_hz)
    }

    /// A timeout of `ticks` at the configured rate.
    pub fn timeout_from_ticks(&self, ticks: u32) -> Timeout {
        Timeout::from_ticks(ticks, self.tick_rate_hz)
    }
}

impl Default for OsConfig {
    fn default() -> Self {
        OsConfig::new()
    }
}

/// The native OS layer: creates primitives and accounts for their handles.
///
/// Cloning an `Os` shares its handle budget.
#[derive(Debug, Clone)]
pub struct Os {
    config: OsConfig,
    budget: Arc<HandleBudget>,
}

impl Os {
    pub fn new(config: OsConfig) -> Self {
        Os {
            config,
            budget: Arc::new(HandleBudget::new(config.max_handles)),
        }
    }

    pub fn config(&self) -> &OsConfig {
        &self.config
    }

    /// Number of primitives created by this layer that are still alive.
    pub fn live_handles(&self) -> usize {
        self.budget.live()
    }

    /// Creates a free mutex. Fails with [`Error::Resource`] when out of handles.
    pub fn create_mutex(&self, name: &str) -> Result<Mutex, Error> {
        let handle = self.budget.claim(name)?;
        Ok(Mutex::with_handle(name.to_string(), handle))
    }

    /// Creates an available binary semaphore.
    pub fn create_semaphore(&self, name: &str) -> Result<Semaphore, Error> {
        let handle = self.budget.claim(name)?;
        Ok(Semaphore::with_handle(name.to_string(), 1, 1, handle))
    }

    /// Creates a counting semaphore holding `initial` of at most `max` units.
    pub fn create_counting_semaphore(
        &self,
        name: &str,
        max: usize,
        initial: usize,
    ) -> Result<Semaphore, Error> {
        semaphore::check_counts(max, initial)?;
        let handle = self.budget.claim(name)?;
        Ok(Semaphore::with_handle(name.to_string(), max, initial, handle))
    }
}

impl Default for Os {
    fn default() -> Self {
        Os::new(OsConfig::default())
    }
}

impl Primitives for Os {
    type Mutex = Mutex;
    type Gate = Semaphore;

    fn create_mutex(&self, name: &str) -> Result<Mutex, Error> {
        Os::create_mutex(self, name)
    }

    fn create_gate(&self, name: &str) -> Result<Semaphore, Error> {
        Os::create_semaphore(self, name)
    }
}
