// SPDX-License-Identifier: MIT OR Apache-2.0
use super::inner::{FirstReader, Pending, RwLock, Unwind};
use crate::guard::ReadGuard;
use crate::os::{Primitives, RawLock};
use crate::timeout::{Deadline, Timeout};
use crate::Error;
use std::sync::atomic::Ordering::Relaxed;

impl<P: Primitives> RwLock<P> {
    /// Acquires the lock for reading, blocking for at most `timeout`.
    ///
    /// Any number of readers may hold the lock at once. Only the first one
    /// (the idle to read-held transition) runs the first-reader hook and takes
    /// the shared gate, so later readers are admitted without waiting for a
    /// writer.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the reader mutex or the gate was not granted in time
    /// - whatever the first-reader hook returned, if it failed
    /// - [`Error::Resource`] if the reader limit is reached
    ///
    /// In every case the reader count and the gate are left as they were.
    ///
    /// # Examples
    ///
    /// ```
    /// use rtos_rwlock::{Error, Os, RwLock, Timeout};
    ///
    /// let lock = RwLock::create(&Os::default(), "m", "l").unwrap();
    /// lock.write_lock(Timeout::FOREVER).unwrap();
    ///
    /// // A writer holds the gate.
    /// assert_eq!(lock.read_lock(Timeout::from_millis(5)), Err(Error::Timeout));
    /// assert_eq!(lock.reader_count(), 0);
    ///
    /// lock.write_unlock().unwrap();
    /// lock.read_lock(Timeout::NO_WAIT).unwrap();
    /// ```
    pub fn read_lock(&self, timeout: Timeout) -> Result<(), Error> {
        let deadline = Deadline::after(timeout);
        self.reader_mutex.acquire(timeout)?;
        let r = match self.admit_reader(deadline) {
            Ok(true) => self
                .gate
                .acquire(deadline.remaining())
                .map_err(|e| self.turn_away_first_reader(e)),
            Ok(false) => Ok(()),
            Err(e) => Err(e),
        };
        self.release_logged("os_rwlock_read_lock", &self.reader_mutex);
        log::trace!("os_rwlock_read_lock {} ({timeout}): {r:?}", self.lock_name());
        r
    }

    /// Acquires the lock for reading without blocking the executor.
    ///
    /// Same semantics as [`read_lock`](Self::read_lock). The first-reader hook
    /// still runs synchronously on the polling thread. Dropping the future
    /// before it completes leaves the lock as it was.
    pub async fn read_lock_async(&self, timeout: Timeout) -> Result<(), Error> {
        let deadline = Deadline::after(timeout);
        self.reader_mutex.acquire_async(timeout).await?;
        let r = match self.admit_reader(deadline) {
            Ok(true) => {
                let unwind = Unwind::new(self, Pending::FirstReader);
                let r = self
                    .gate
                    .acquire_async(deadline.remaining())
                    .await
                    .map_err(|e| self.turn_away_first_reader(e));
                unwind.disarm();
                r
            }
            Ok(false) => Ok(()),
            Err(e) => Err(e),
        };
        self.release_logged("os_rwlock_read_lock_async", &self.reader_mutex);
        log::trace!("os_rwlock_read_lock_async {} ({timeout}): {r:?}", self.lock_name());
        r
    }

    /// Releases one reader. The last reader out gives the gate back.
    ///
    /// Fails with [`Error::InvalidState`], changing nothing, if no reader
    /// holds the lock.
    pub fn read_unlock(&self) -> Result<(), Error> {
        self.reader_mutex.acquire(Timeout::FOREVER)?;
        let r = match self.reader_count.load(Relaxed) {
            0 => {
                log::warn!("os_rwlock_read_unlock {}: no reader holds the lock", self.lock_name());
                Err(Error::InvalidState)
            }
            1 => {
                self.reader_count.store(0, Relaxed);
                self.gate.release().map_err(|e| {
                    self.reader_count.store(1, Relaxed);
                    e
                })
            }
            n => {
                self.reader_count.store(n - 1, Relaxed);
                Ok(())
            }
        };
        self.release_logged("os_rwlock_read_unlock", &self.reader_mutex);
        log::trace!("os_rwlock_read_unlock {}: {r:?}", self.lock_name());
        r
    }

    /// Acquires the lock for reading and returns a guard that unlocks on drop.
    ///
    /// ```
    /// use rtos_rwlock::{LockState, Os, RwLock, Timeout};
    ///
    /// let lock = RwLock::create(&Os::default(), "m", "l").unwrap();
    /// {
    ///     let _a = lock.read(Timeout::FOREVER).unwrap();
    ///     let _b = lock.read(Timeout::FOREVER).unwrap();
    ///     assert_eq!(lock.state(), LockState::ReadHeld(2));
    /// }
    /// assert_eq!(lock.state(), LockState::Idle);
    /// ```
    pub fn read(&self, timeout: Timeout) -> Result<ReadGuard<'_, P>, Error> {
        self.read_lock(timeout)?;
        Ok(ReadGuard { lock: self })
    }

    pub async fn read_async(&self, timeout: Timeout) -> Result<ReadGuard<'_, P>, Error> {
        self.read_lock_async(timeout).await?;
        Ok(ReadGuard { lock: self })
    }

    /// Runs `f` while holding the lock for reading.
    pub fn with_read<R, F: FnOnce() -> R>(&self, timeout: Timeout, f: F) -> Result<R, Error> {
        let _guard = self.read(timeout)?;
        Ok(f())
    }

    /// Counts one more reader. Must be called with `reader_mutex` held.
    ///
    /// Returns `true` for the first reader, which still has to take the gate.
    fn admit_reader(&self, deadline: Deadline) -> Result<bool, Error> {
        let count = self.reader_count.load(Relaxed);
        if count >= self.max_readers {
            log::warn!(
                "os_rwlock_read_lock {}: {count} readers, limit reached",
                self.lock_name()
            );
            return Err(Error::Resource(self.lock_name().to_string()));
        }
        self.reader_count.store(count + 1, Relaxed);
        if count != 0 {
            return Ok(false);
        }

        if let Some(on_first_reader) = &self.on_first_reader {
            let first = FirstReader {
                lock_name: self.lock_name(),
                remaining: deadline.remaining(),
            };
            if let Err(e) = on_first_reader(first) {
                log::warn!("os_rwlock_read_lock {}: first-reader hook failed: {e}", self.lock_name());
                return Err(self.turn_away_first_reader(e));
            }
        }
        Ok(true)
    }

    /// Undoes the first reader's increment. Must be called with `reader_mutex` held.
    fn turn_away_first_reader(&self, e: Error) -> Error {
        self.reader_count.store(0, Relaxed);
        e
    }
}
