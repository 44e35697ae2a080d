// SPDX-License-Identifier: MIT OR Apache-2.0
use super::acquire::{self, Acquire};
use super::handles::Handle;
use super::wait_list::WaitList;
use super::{NotAvailable, RawLock};
use crate::timeout::{Deadline, Timeout};
use crate::Error;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A named counting semaphore with a fixed maximum.
///
/// [`get`](Self::get) takes one unit, blocking while the count is zero;
/// [`put`](Self::put) gives one back. Giving to a semaphore that is already
/// at its maximum fails with [`Error::InvalidState`] and leaves the count
/// alone.
///
/// A binary semaphore (maximum 1) is the shared gate of the reader-writer
/// lock: unlike [`Mutex`](super::Mutex) it is routinely given back by a
/// different thread than the one that took it.
///
/// # Examples
///
/// ```
/// use rtos_rwlock::os::Semaphore;
/// use rtos_rwlock::{Error, Timeout};
///
/// let pool = Semaphore::counting("tx_buffers", 2, 2).unwrap();
/// pool.get(Timeout::NO_WAIT).unwrap();
/// pool.get(Timeout::NO_WAIT).unwrap();
/// assert_eq!(pool.count(), 0);
/// assert_eq!(pool.get(Timeout::NO_WAIT), Err(Error::Timeout));
///
/// pool.put().unwrap();
/// pool.put().unwrap();
/// assert_eq!(pool.put(), Err(Error::InvalidState));
/// ```
#[derive(Debug)]
pub struct Semaphore {
    name: String,
    count: AtomicUsize,
    max: usize,
    waiters: WaitList,
    _handle: Handle,
}

impl Semaphore {
    /// Creates an available binary semaphore, not counted against any [`Os`](super::Os) budget.
    pub fn binary(name: impl Into<String>) -> Self {
        Semaphore::with_handle(name.into(), 1, 1, Handle::detached())
    }

    /// Creates a counting semaphore holding `initial` of at most `max` units.
    ///
    /// Fails with [`Error::InvalidState`] if `max` is zero or `initial > max`.
    pub fn counting(name: impl Into<String>, max: usize, initial: usize) -> Result<Self, Error> {
        check_counts(max, initial)?;
        Ok(Semaphore::with_handle(
            name.into(),
            max,
            initial,
            Handle::detached(),
        ))
    }

    pub(crate) fn with_handle(name: String, max: usize, initial: usize, handle: Handle) -> Self {
        log::debug!("os_semaphore_create {name} ({initial}/{max})");
        Semaphore {
            name,
            count: AtomicUsize::new(initial),
            max,
            waiters: WaitList::new(),
            _handle: handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Units currently available. A snapshot only.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Takes one unit if any is available, without blocking.
    pub fn try_get(&self) -> Result<(), NotAvailable> {
        self.count
            .fetch_update(Ordering::Acquire, Ordering::Relaxed, |c| c.checked_sub(1))
            .map(|_| ())
            .map_err(|_| NotAvailable)
    }

    /// Takes one unit, blocking for at most `timeout`.
    pub fn get(&self, timeout: Timeout) -> Result<(), Error> {
        let r = acquire::acquire_sync(self, Deadline::after(timeout));
        log::trace!("os_semaphore_get {} ({timeout}): {r:?}", self.name);
        r
    }

    /// Takes one unit without blocking the executor, waiting at most `timeout`.
    pub async fn get_async(&self, timeout: Timeout) -> Result<(), Error> {
        let r = acquire::acquire_async(self, Deadline::after(timeout)).await;
        log::trace!("os_semaphore_get_async {} ({timeout}): {r:?}", self.name);
        r
    }

    /// Gives one unit back and wakes the waiters.
    pub fn put(&self) -> Result<(), Error> {
        let max = self.max;
        match self
            .count
            .fetch_update(Ordering::Release, Ordering::Relaxed, |c| {
                (c < max).then_some(c + 1)
            }) {
            Ok(_) => {
                self.waiters.wake_all();
                log::trace!("os_semaphore_put {}", self.name);
                Ok(())
            }
            Err(_) => {
                log::warn!("os_semaphore_put {}: already at {max}", self.name);
                Err(Error::InvalidState)
            }
        }
    }
}

pub(crate) fn check_counts(max: usize, initial: usize) -> Result<(), Error> {
    if max == 0 || initial > max {
        Err(Error::InvalidState)
    } else {
        Ok(())
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        log::debug!("os_semaphore_delete {}", self.name);
    }
}

impl Acquire for Semaphore {
    fn try_acquire(&self) -> Result<(), NotAvailable> {
        self.try_get()
    }

    fn wait_list(&self) -> &WaitList {
        &self.waiters
    }
}

impl RawLock for Semaphore {
    fn acquire(&self, timeout: Timeout) -> Result<(), Error> {
        self.get(timeout)
    }

    fn acquire_async(&self, timeout: Timeout) -> impl Future<Output = Result<(), Error>> + '_ {
        self.get_async(timeout)
    }

    fn release(&self) -> Result<(), Error> {
        self.put()
    }
}
