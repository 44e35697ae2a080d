// SPDX-License-Identifier: MIT OR Apache-2.0
//! RAII guards for [`RwLock`].
//!
//! The lock protects a resource it does not own, so the guards carry no data.
//! They only make sure the matching unlock runs, even on early return or panic.

use crate::os::{Os, Primitives};
use crate::rwlock::RwLock;

/// Shared access to whatever an [`RwLock`] protects. Calls
/// [`read_unlock`](RwLock::read_unlock) on drop.
///
/// # Examples
///
/// ```
/// use rtos_rwlock::{Os, RwLock, Timeout};
///
/// let lock = RwLock::create(&Os::default(), "m", "l").unwrap();
/// let guard = lock.read(Timeout::FOREVER).unwrap();
/// assert_eq!(guard.lock().reader_count(), 1);
/// drop(guard);
/// assert_eq!(lock.reader_count(), 0);
/// ```
#[must_use = "the read lock is released as soon as the guard is dropped"]
pub struct ReadGuard<'a, P: Primitives = Os> {
    pub(crate) lock: &'a RwLock<P>,
}

impl<'a, P: Primitives> ReadGuard<'a, P> {
    pub fn lock(&self) -> &'a RwLock<P> {
        self.lock
    }
}

impl<P: Primitives> Drop for ReadGuard<'_, P> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.read_unlock() {
            log::error!("read guard for {} failed to unlock: {e}", self.lock.lock_name());
        }
    }
}

/// Exclusive access to whatever an [`RwLock`] protects. Calls
/// [`write_unlock`](RwLock::write_unlock) on drop.
///
/// # Examples
///
/// ```
/// use rtos_rwlock::{LockState, Os, RwLock, Timeout};
///
/// let lock = RwLock::create(&Os::default(), "m", "l").unwrap();
/// {
///     let _guard = lock.write(Timeout::FOREVER).unwrap();
///     assert_eq!(lock.state(), LockState::WriteHeld);
/// }
/// assert_eq!(lock.state(), LockState::Idle);
/// ```
#[must_use = "the write lock is released as soon as the guard is dropped"]
pub struct WriteGuard<'a, P: Primitives = Os> {
    pub(crate) lock: &'a RwLock<P>,
}

impl<'a, P: Primitives> WriteGuard<'a, P> {
    pub fn lock(&self) -> &'a RwLock<P> {
        self.lock
    }
}

impl<P: Primitives> Drop for WriteGuard<'_, P> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.write_unlock() {
            log::error!("write guard for {} failed to unlock: {e}", self.lock.lock_name());
        }
    }
}

// ================================================================================================
// Boilerplate trait implementations
// ================================================================================================

impl<P: Primitives> std::fmt::Debug for ReadGuard<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadGuard")
            .field("lock", &self.lock.lock_name())
            .finish()
    }
}

impl<P: Primitives> std::fmt::Debug for WriteGuard<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteGuard")
            .field("lock", &self.lock.lock_name())
            .finish()
    }
}
