// SPDX-License-Identifier: MIT OR Apache-2.0
//! A reader-priority reader-writer lock for RTOS-style code, with the
//! timeout-bounded mutexes and semaphores it is built from.
//!
//! Embedded firmware often guards shared driver state (a Wi-Fi connection
//! table, a scan cache, power-save state) with a reader-writer lock whose
//! operations take an explicit timeout and whose lock and unlock are separate
//! calls rather than a scoped guard. This crate provides that lock:
//!
//! - [`RwLock`]: readers share, writers are exclusive, readers have priority,
//!   and an optional hook runs whenever the lock goes from idle to read-held.
//! - [`os`]: the primitives it consumes ([`os::Mutex`], [`os::Semaphore`])
//!   and the [`os::Primitives`] seam for running it on another OS layer.
//! - [`Timeout`]: "wait forever", "no wait", or a bound, convertible to and
//!   from scheduler ticks.
//!
//! Blocking calls park the thread. On `wasm32` threads that may not block
//! (the browser main thread) spin instead, and every acquisition has an async
//! form that never blocks the executor.
//!
//! # Example
//!
//! ```
//! use rtos_rwlock::{Error, Os, RwLock, Timeout};
//!
//! let os = Os::default();
//! let lock = RwLock::create(&os, "conn_mutex", "conn_lock").unwrap();
//!
//! lock.read_lock(Timeout::from_millis(100)).unwrap();
//! // ... read the shared table ...
//! lock.read_unlock().unwrap();
//!
//! {
//!     let _writer = lock.write(Timeout::FOREVER).unwrap();
//!     // ... update the shared table ...
//! }
//!
//! // Unlocking what is not held is reported, not ignored.
//! assert_eq!(lock.read_unlock(), Err(Error::InvalidState));
//! ```
//!
//! # Logging
//!
//! Primitive and lock creation and deletion are logged at `debug`, every
//! acquire and release at `trace`, and misuse (unbalanced unlocks, a failing
//! first-reader hook, handle exhaustion) at `warn`, through the [`log`]
//! facade. Install any `log` backend to see them.

mod error;
mod guard;
pub mod os;
pub mod rwlock;
mod spinlock;
mod timeout;
#[cfg(target_arch = "wasm32")]
mod wasm_support;

pub use error::Error;
pub use guard::{ReadGuard, WriteGuard};
pub use os::{Os, OsConfig};
pub use rwlock::{FirstReader, LockState, RwLock};
pub use timeout::{Timeout, WAIT_FOREVER_TICKS};
