// SPDX-License-Identifier: MIT OR Apache-2.0
use super::inner::{Pending, RwLock, Unwind};
use crate::guard::WriteGuard;
use crate::os::{Primitives, RawLock};
use crate::timeout::{Deadline, Timeout};
use crate::Error;
use std::sync::atomic::Ordering;

impl<P: Primitives> RwLock<P> {
    /// Acquires the lock for writing, blocking for at most `timeout`.
    ///
    /// Takes the write mutex, then the shared gate with what is left of the
    /// timeout. The gate is only free once every reader has left, so a writer
    /// may wait indefinitely behind overlapping readers.
    ///
    /// Fails with [`Error::Timeout`] if either was not granted in time; the
    /// write mutex is given back in that case.
    ///
    /// # Examples
    ///
    /// ```
    /// use rtos_rwlock::{Error, LockState, Os, RwLock, Timeout};
    ///
    /// let lock = RwLock::create(&Os::default(), "m", "l").unwrap();
    /// lock.write_lock(Timeout::FOREVER).unwrap();
    /// assert_eq!(lock.state(), LockState::WriteHeld);
    ///
    /// // Writers exclude each other.
    /// assert_eq!(lock.write_lock(Timeout::NO_WAIT), Err(Error::Timeout));
    ///
    /// lock.write_unlock().unwrap();
    /// assert_eq!(lock.state(), LockState::Idle);
    /// ```
    pub fn write_lock(&self, timeout: Timeout) -> Result<(), Error> {
        let deadline = Deadline::after(timeout);
        self.write_mutex.acquire(timeout)?;
        let r = self.gate.acquire(deadline.remaining());
        log::trace!("os_rwlock_write_lock {} ({timeout}): {r:?}", self.lock_name());
        self.finish_write_lock(r)
    }

    /// Acquires the lock for writing without blocking the executor.
    ///
    /// Dropping the future before it completes gives the write mutex back.
    pub async fn write_lock_async(&self, timeout: Timeout) -> Result<(), Error> {
        let deadline = Deadline::after(timeout);
        self.write_mutex.acquire_async(timeout).await?;
        let unwind = Unwind::new(self, Pending::WriteMutex);
        let r = self.gate.acquire_async(deadline.remaining()).await;
        unwind.disarm();
        log::trace!("os_rwlock_write_lock_async {} ({timeout}): {r:?}", self.lock_name());
        self.finish_write_lock(r)
    }

    /// Releases the write lock: gives back the gate, then the write mutex.
    ///
    /// Fails with [`Error::InvalidState`], changing nothing, if no writer
    /// holds the lock.
    pub fn write_unlock(&self) -> Result<(), Error> {
        if !self.writer_active.swap(false, Ordering::AcqRel) {
            log::warn!("os_rwlock_write_unlock {}: no writer holds the lock", self.lock_name());
            return Err(Error::InvalidState);
        }
        if let Err(e) = self.gate.release() {
            self.writer_active.store(true, Ordering::Release);
            return Err(e);
        }
        self.release_logged("os_rwlock_write_unlock", &self.write_mutex);
        log::trace!("os_rwlock_write_unlock {}", self.lock_name());
        Ok(())
    }

    /// Acquires the lock for writing and returns a guard that unlocks on drop.
    pub fn write(&self, timeout: Timeout) -> Result<WriteGuard<'_, P>, Error> {
        self.write_lock(timeout)?;
        Ok(WriteGuard { lock: self })
    }

    pub async fn write_async(&self, timeout: Timeout) -> Result<WriteGuard<'_, P>, Error> {
        self.write_lock_async(timeout).await?;
        Ok(WriteGuard { lock: self })
    }

    /// Runs `f` while holding the lock for writing.
    pub fn with_write<R, F: FnOnce() -> R>(&self, timeout: Timeout, f: F) -> Result<R, Error> {
        let _guard = self.write(timeout)?;
        Ok(f())
    }

    /// Records the writer once the gate is held, or gives the write mutex back.
    fn finish_write_lock(&self, gate: Result<(), Error>) -> Result<(), Error> {
        match gate {
            Ok(()) => {
                self.writer_active.store(true, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                self.release_logged("os_rwlock_write_lock", &self.write_mutex);
                Err(e)
            }
        }
    }
}
