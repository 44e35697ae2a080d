// SPDX-License-Identifier: MIT OR Apache-2.0
use super::acquire::{self, Acquire};
use super::handles::Handle;
use super::wait_list::WaitList;
use super::{NotAvailable, RawLock};
use crate::timeout::{Deadline, Timeout};
use crate::Error;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

/// A named, timeout-bounded exclusive lock.
///
/// Unlike a data-carrying mutex, taking and giving back are separate calls
/// ([`get`](Self::get) / [`put`](Self::put)), so the lock can stay held across
/// function boundaries the way RTOS code uses it.
///
/// The mutex does not track which thread holds it: any thread may `put` a
/// held mutex. Putting a mutex that is not held fails with
/// [`Error::InvalidState`].
///
/// # Examples
///
/// ```
/// use rtos_rwlock::os::Mutex;
/// use rtos_rwlock::{Error, Timeout};
///
/// let mutex = Mutex::new("uart_mutex");
/// mutex.get(Timeout::FOREVER).unwrap();
/// assert!(mutex.is_locked());
///
/// // Already held, so a bounded wait times out.
/// assert_eq!(mutex.get(Timeout::from_millis(5)), Err(Error::Timeout));
///
/// mutex.put().unwrap();
/// assert_eq!(mutex.put(), Err(Error::InvalidState));
/// ```
#[derive(Debug)]
pub struct Mutex {
    name: String,
    locked: AtomicBool,
    waiters: WaitList,
    _handle: Handle,
}

impl Mutex {
    /// Creates a free mutex that is not counted against any [`Os`](super::Os) budget.
    pub fn new(name: impl Into<String>) -> Self {
        Mutex::with_handle(name.into(), Handle::detached())
    }

    pub(crate) fn with_handle(name: String, handle: Handle) -> Self {
        log::debug!("os_mutex_create {name}");
        Mutex {
            name,
            locked: AtomicBool::new(false),
            waiters: WaitList::new(),
            _handle: handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether some caller currently holds the mutex. A snapshot only.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Takes the mutex if it is free, without blocking.
    pub fn try_get(&self) -> Result<(), NotAvailable> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map(|_| ())
            .map_err(|_| NotAvailable)
    }

    /// Takes the mutex, blocking for at most `timeout`.
    ///
    /// On platforms where the current thread may not block (the browser main
    /// thread) this spins instead.
    pub fn get(&self, timeout: Timeout) -> Result<(), Error> {
        let r = acquire::acquire_sync(self, Deadline::after(timeout));
        log::trace!("os_mutex_get {} ({timeout}): {r:?}", self.name);
        r
    }

    /// Takes the mutex without blocking the executor, waiting at most `timeout`.
    pub async fn get_async(&self, timeout: Timeout) -> Result<(), Error> {
        let r = acquire::acquire_async(self, Deadline::after(timeout)).await;
        log::trace!("os_mutex_get_async {} ({timeout}): {r:?}", self.name);
        r
    }

    /// Gives the mutex back and wakes its waiters.
    pub fn put(&self) -> Result<(), Error> {
        if self.locked.swap(false, Ordering::Release) {
            self.waiters.wake_all();
            log::trace!("os_mutex_put {}", self.name);
            Ok(())
        } else {
            log::warn!("os_mutex_put {}: mutex is not held", self.name);
            Err(Error::InvalidState)
        }
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        log::debug!("os_mutex_delete {}", self.name);
    }
}

impl Acquire for Mutex {
    fn try_acquire(&self) -> Result<(), NotAvailable> {
        self.try_get()
    }

    fn wait_list(&self) -> &WaitList {
        &self.waiters
    }
}

impl RawLock for Mutex {
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
