// SPDX-License-Identifier: MIT OR Apache-2.0
//! A spinlock for the very short critical sections that manage waiter lists.
//!
//! Every OS primitive in this crate keeps the threads and tasks waiting on it
//! in a [`Spinlock`]. The lock is only ever held for a `Vec::push` or a
//! `std::mem::take`, so spinning is cheaper than parking.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};

/// A spinlock protecting a value that is only reachable through [`with_mut`](Self::with_mut).
#[derive(Debug)]
pub(crate) struct Spinlock<T> {
    data: UnsafeCell<T>,
    locked: AtomicBool,
}

impl<T> Spinlock<T> {
    pub(crate) const fn new(data: T) -> Self {
        Spinlock {
            data: UnsafeCell::new(data),
            locked: AtomicBool::new(false),
        }
    }

    /// Runs `f` with exclusive access to the protected value.
    ///
    /// The closure must not block or re-enter this spinlock.
    pub(crate) fn with_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        while self.locked.swap(true, Ordering::Acquire) {
            std::hint::spin_loop();
        }

        // Releases even if `f` unwinds, so a panicking waker cannot wedge the list.
        struct Unlock<'a>(&'a AtomicBool);
        impl Drop for Unlock<'_> {
            fn drop(&mut self) {
                self.0.store(false, Ordering::Release);
            }
        }
        let _unlock = Unlock(&self.locked);

        // SAFETY: `locked` was swapped from false to true above, so we are the only holder.
        unsafe { f(&mut *self.data.get()) }
    }
}

unsafe impl<T: Send> Send for Spinlock<T> {}
unsafe impl<T: Send> Sync for Spinlock<T> {}
