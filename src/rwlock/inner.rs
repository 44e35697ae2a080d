// SPDX-License-Identifier: MIT OR Apache-2.0
use super::{DEFAULT_LOCK_NAME, DEFAULT_MUTEX_NAME};
use crate::os::{Os, Primitives, RawLock};
use crate::timeout::Timeout;
use crate::Error;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// The first-reader hook.
///
/// Called with the reader mutex held, so it must not take this lock itself.
pub type FirstReaderFn = dyn Fn(FirstReader<'_>) -> Result<(), Error> + Send + Sync;

/// What the first-reader hook is told about the acquisition that triggered it.
#[derive(Debug, Clone, Copy)]
pub struct FirstReader<'a> {
    pub(crate) lock_name: &'a str,
    pub(crate) remaining: Timeout,
}

impl FirstReader<'_> {
    /// Name of the lock's shared gate.
    pub fn lock_name(&self) -> &str {
        self.lock_name
    }

    /// What is left of the reader's timeout. The gate is taken with whatever
    /// remains once the hook returns.
    pub fn remaining(&self) -> Timeout {
        self.remaining
    }
}

/// Who holds the lock, as seen at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockState {
    Idle,
    /// Held by this many readers.
    ReadHeld(usize),
    WriteHeld,
}

/// A reader-priority reader-writer lock.
///
/// The lock guards an external resource rather than owning data: callers
/// bracket their access with [`read_lock`](Self::read_lock) /
/// [`read_unlock`](Self::read_unlock) or [`write_lock`](Self::write_lock) /
/// [`write_unlock`](Self::write_unlock), or use the guard-returning
/// [`read`](Self::read) / [`write`](Self::write).
///
/// Every acquisition takes a [`Timeout`]. A failed acquisition leaves the lock
/// exactly as it found it and means the lock is not held; do not unlock after
/// an error.
///
/// See the [module documentation](crate::rwlock) for the algorithm.
pub struct RwLock<P: Primitives = Os> {
    pub(crate) reader_mutex: P::Mutex,
    pub(crate) write_mutex: P::Mutex,
    pub(crate) gate: P::Gate,
    /// Only modified while `reader_mutex` is held.
    pub(crate) reader_count: AtomicUsize,
    pub(crate) writer_active: AtomicBool,
    pub(crate) max_readers: usize,
    pub(crate) on_first_reader: Option<Box<FirstReaderFn>>,
    mutex_name: String,
    lock_name: String,
}

impl<P: Primitives> RwLock<P> {
    /// Creates a lock without a first-reader hook.
    ///
    /// The reader mutex is named `mutex_name`, the write mutex
    /// `"{mutex_name}.write"` and the shared gate `lock_name`. Fails with
    /// [`Error::Resource`] if any primitive cannot be created; primitives
    /// created before the failure are deleted again.
    pub fn create(
        primitives: &P,
        mutex_name: impl Into<String>,
        lock_name: impl Into<String>,
    ) -> Result<Self, Error> {
        Builder::new()
            .mutex_name(mutex_name)
            .lock_name(lock_name)
            .build(primitives)
    }

    /// Creates a lock that runs `on_first_reader` on every idle-to-read-held transition.
    pub fn create_with_callback<F>(
        primitives: &P,
        mutex_name: impl Into<String>,
        lock_name: impl Into<String>,
        on_first_reader: F,
    ) -> Result<Self, Error>
    where
        F: Fn(FirstReader<'_>) -> Result<(), Error> + Send + Sync + 'static,
    {
        Builder::new()
            .mutex_name(mutex_name)
            .lock_name(lock_name)
            .on_first_reader(on_first_reader)
            .build(primitives)
    }

    /// Deletes the lock and its primitives.
    ///
    /// No thread may be blocked on the lock when it is destroyed. Ownership
    /// rules out most misuse, but a lock shared through `Arc` must only be
    /// destroyed by its last user once everyone has unlocked.
    pub fn destroy(self) {
        drop(self)
    }

    /// Readers currently inside. A snapshot only.
    pub fn reader_count(&self) -> usize {
        self.reader_count.load(Ordering::Acquire)
    }

    /// Current holder of the lock. A snapshot only.
    pub fn state(&self) -> LockState {
        if self.writer_active.load(Ordering::Acquire) {
            return LockState::WriteHeld;
        }
        match self.reader_count() {
            0 => LockState::Idle,
            n => LockState::ReadHeld(n),
        }
    }

    pub fn mutex_name(&self) -> &str {
        &self.mutex_name
    }

    pub fn lock_name(&self) -> &str {
        &self.lock_name
    }

    pub fn max_readers(&self) -> usize {
        self.max_readers
    }

    /// Gives back `mutex` once `op` has taken effect or been fully undone.
    ///
    /// A failed release is logged, not returned, so the caller's result keeps
    /// saying whether the lock is held.
    pub(super) fn release_logged(&self, op: &str, mutex: &P::Mutex) {
        if let Err(e) = mutex.release() {
            log::error!("{op} {}: releasing its mutex failed: {e}", self.lock_name);
        }
    }
}

/// What an async acquisition holds while it awaits the gate.
#[derive(Debug, Clone, Copy)]
pub(super) enum Pending {
    /// The reader mutex, with the reader count already at 1.
    FirstReader,
    WriteMutex,
}

/// Hands back a pending async acquisition's mutex if its future is dropped
/// before the gate is granted.
pub(super) struct Unwind<'a, P: Primitives> {
    lock: &'a RwLock<P>,
    pending: Option<Pending>,
}

impl<'a, P: Primitives> Unwind<'a, P> {
    pub(super) fn new(lock: &'a RwLock<P>, pending: Pending) -> Self {
        Unwind {
            lock,
            pending: Some(pending),
        }
    }

    /// The acquisition finished and cleans up after itself.
    pub(super) fn disarm(mut self) {
        self.pending = None;
    }
}

impl<P: Primitives> Drop for Unwind<'_, P> {
    fn drop(&mut self) {
        let Some(pending) = self.pending else {
            return;
        };
        log::debug!(
            "os_rwlock {}: async acquisition dropped while waiting for the gate ({pending:?})",
            self.lock.lock_name
        );
        match pending {
            Pending::FirstReader => {
                self.lock.reader_count.store(0, Ordering::Relaxed);
                self.lock
                    .release_logged("os_rwlock_read_lock_async", &self.lock.reader_mutex);
            }
            Pending::WriteMutex => {
                self.lock
                    .release_logged("os_rwlock_write_lock_async", &self.lock.write_mutex);
            }
        }
    }
}

impl<P: Primitives> std::fmt::Debug for RwLock<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RwLock")
            .field("mutex_name", &self.mutex_name)
            .field("lock_name", &self.lock_name)
            .field("state", &self.state())
            .field("max_readers", &self.max_readers)
            .field("on_first_reader", &self.on_first_reader.is_some())
            .finish_non_exhaustive()
    }
}

impl<P: Primitives> Drop for RwLock<P> {
    fn drop(&mut self) {
        log::debug!("os_rwlock_delete {}", self.lock_name);
    }
}

/// Configures and creates an [`RwLock`].
///
/// # Examples
///
/// ```
/// use rtos_rwlock::rwlock::Builder;
/// use rtos_rwlock::{Error, Os, Timeout};
///
/// let lock = Builder::new()
///     .mutex_name("sta_mutex")
///     .lock_name("sta_lock")
///     .max_readers(1)
///     .build(&Os::default())
///     .unwrap();
///
/// lock.read_lock(Timeout::NO_WAIT).unwrap();
/// assert_eq!(
///     lock.read_lock(Timeout::NO_WAIT),
///     Err(Error::Resource("sta_lock".to_string()))
/// );
/// ```
pub struct Builder {
    mutex_name: String,
    lock_name: String,
    max_readers: usize,
    on_first_reader: Option<Box<FirstReaderFn>>,
}

impl Builder {
    /// Default names, no reader limit, no hook.
    pub fn new() -> Self {
        Builder {
            mutex_name: DEFAULT_MUTEX_NAME.to_string(),
            lock_name: DEFAULT_LOCK_NAME.to_string(),
            max_readers: usize::MAX,
            on_first_reader: None,
        }
    }

    pub fn mutex_name(mut self, name: impl Into<String>) -> Self {
        self.mutex_name = name.into();
        self
    }

    pub fn lock_name(mut self, name: impl Into<String>) -> Self {
        self.lock_name = name.into();
        self
    }

    /// Caps concurrent readers. A reader beyond the cap fails with
    /// [`Error::Resource`]. Must be at least 1.
    pub fn max_readers(mut self, max_readers: usize) -> Self {
        self.max_readers = max_readers;
        self
    }

    pub fn on_first_reader<F>(mut self, f: F) -> Self
    where
        F: Fn(FirstReader<'_>) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.on_first_reader = Some(Box::new(f));
        self
    }

    /// Creates the primitives and the lock.
    ///
    /// Fails with [`Error::InvalidState`] if `max_readers` is zero and with
    /// [`Error::Resource`] if a primitive cannot be created.
    pub fn build<P: Primitives>(self, primitives: &P) -> Result<RwLock<P>, Error> {
        if self.max_readers == 0 {
            return Err(Error::InvalidState);
        }
        let reader_mutex = primitives.create_mutex(&self.mutex_name)?;
        let write_mutex = primitives.create_mutex(&format!("{}.write", self.mutex_name))?;
        let gate = primitives.create_gate(&self.lock_name)?;
        log::debug!("os_rwlock_create {} / {}", self.mutex_name, self.lock_name);
        Ok(RwLock {
            reader_mutex,
            write_mutex,
            gate,
            reader_count: AtomicUsize::new(0),
            writer_active: AtomicBool::new(false),
            max_readers: self.max_readers,
            on_first_reader: self.on_first_reader,
            mutex_name: self.mutex_name,
            lock_name: self.lock_name,
        })
    }
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("mutex_name", &self.mutex_name)
            .field("lock_name", &self.lock_name)
            .field("max_readers", &self.max_readers)
            .field("on_first_reader", &self.on_first_reader.is_some())
            .finish()
    }
}
