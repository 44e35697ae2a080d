// SPDX-License-Identifier: MIT OR Apache-2.0
//! A reader-priority reader-writer lock with a first-reader hook.
//!
//! # How it works
//!
//! The lock is built from three primitives supplied by an OS layer
//! ([`Primitives`](crate::os::Primitives)):
//!
//! - a **reader mutex** serializing updates of the reader count,
//! - a **write mutex** serializing writers,
//! - a binary **shared gate**, held either by the readers as a group or by
//!   one writer.
//!
//! The first reader to arrive takes the gate on behalf of every reader that
//! follows; the last reader to leave gives it back. A writer takes the write
//! mutex, then the gate.
//!
//! # Reader priority
//!
//! Once one reader is inside, later readers only contend for the reader mutex,
//! which is held for a few instructions. They never queue behind a waiting
//! writer, so a steady stream of overlapping readers can starve writers
//! indefinitely. Use this lock where reads dominate and writers can tolerate
//! the wait.
//!
//! # First-reader hook
//!
//! An optional callback runs each time the lock goes from idle to read-held,
//! before the gate is taken, with whatever is left of the caller's timeout.
//! It is meant for setup that writers must never observe half-done. If it
//! fails, the reader is turned away and the lock is left exactly as it was.
//!
//! # Examples
//!
//! ## Raw lock / unlock
//!
//! ```
//! use rtos_rwlock::{Error, Os, RwLock, Timeout};
//!
//! let os = Os::default();
//! let lock = RwLock::create(&os, "scan_mutex", "scan_lock").unwrap();
//!
//! lock.read_lock(Timeout::FOREVER).unwrap();
//! lock.read_lock(Timeout::FOREVER).unwrap();
//! assert_eq!(lock.reader_count(), 2);
//!
//! // Readers hold the gate, so a writer cannot get in.
//! assert_eq!(lock.write_lock(Timeout::from_millis(10)), Err(Error::Timeout));
//!
//! lock.read_unlock().unwrap();
//! lock.read_unlock().unwrap();
//! lock.write_lock(Timeout::NO_WAIT).unwrap();
//! lock.write_unlock().unwrap();
//! ```
//!
//! ## First-reader hook
//!
//! ```
//! use rtos_rwlock::{Os, RwLock, Timeout};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let wakeups = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&wakeups);
//!
//! let os = Os::default();
//! let lock = RwLock::create_with_callback(&os, "ps_mutex", "ps_lock", move |_first| {
//!     // e.g. bring the radio out of power save before anyone reads
//!     counter.fetch_add(1, Ordering::SeqCst);
//!     Ok(())
//! })
//! .unwrap();
//!
//! let a = lock.read(Timeout::FOREVER).unwrap();
//! let b = lock.read(Timeout::FOREVER).unwrap();
//! drop((a, b));
//! let _c = lock.read(Timeout::FOREVER).unwrap();
//!
//! assert_eq!(wakeups.load(Ordering::SeqCst), 2);
//! ```
//!
//! ## Sharing between threads
//!
//! ```
//! # // std::thread::spawn panics on wasm32
//! # if cfg!(target_arch = "wasm32") { return; }
//! use rtos_rwlock::{Os, RwLock, Timeout};
//! use std::sync::Arc;
//! # use std::thread;
//!
//! let lock = Arc::new(RwLock::create(&Os::default(), "tbl_mutex", "tbl_lock").unwrap());
//! let handles: Vec<_> = (0..3)
//!     .map(|_| {
//!         let lock = Arc::clone(&lock);
//!         thread::spawn(move || lock.with_read(Timeout::FOREVER, || 7).unwrap())
//!     })
//!     .collect();
//! for h in handles {
//!     assert_eq!(h.join().unwrap(), 7);
//! }
//! ```

mod inner;
mod read;
mod write;

#[cfg(test)]
mod tests;

pub use inner::{Builder, FirstReader, FirstReaderFn, LockState, RwLock};

/// Default name of the reader mutex.
pub const DEFAULT_MUTEX_NAME: &str = "rw_mutex";
/// Default name of the shared gate.
pub const DEFAULT_LOCK_NAME: &str = "rw_lock";
