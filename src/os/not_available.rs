// SPDX-License-Identifier: MIT OR Apache-2.0
/// Error returned when a primitive cannot be taken without blocking.
///
/// This is the error of [`Mutex::try_get`](crate::os::Mutex::try_get) and
/// [`Semaphore::try_get`](crate::os::Semaphore::try_get). The timeout-bounded
/// calls report [`Error::Timeout`](crate::Error::Timeout) instead.
///
/// # Examples
///
/// ```
/// use rtos_rwlock::os::{Mutex, NotAvailable};
/// use rtos_rwlock::Timeout;
///
/// let mutex = Mutex::new("scan_mutex");
/// mutex.get(Timeout::FOREVER).unwrap();
///
/// assert_eq!(mutex.try_get(), Err(NotAvailable));
/// mutex.put().unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotAvailable;

impl std::fmt::Display for NotAvailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "primitive not available")
    }
}

impl std::error::Error for NotAvailable {}
