// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors returned by the OS primitives and the reader-writer lock.

/// Error returned by a lock or primitive operation.
///
/// Any error from an acquisition means the lock is **not** held. Callers must
/// not call the matching unlock after an error.
///
/// # Examples
///
/// ```
/// use rtos_rwlock::{Error, Os, RwLock, Timeout};
///
/// let os = Os::default();
/// let lock = RwLock::create(&os, "cfg_mutex", "cfg_lock").unwrap();
///
/// lock.write_lock(Timeout::FOREVER).unwrap();
/// assert_eq!(lock.read_lock(Timeout::NO_WAIT), Err(Error::Timeout));
/// lock.write_unlock().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Error {
    /// The acquisition was not granted within the timeout.
    Timeout,
    /// The call does not match the current state, e.g. an unbalanced unlock.
    InvalidState,
    /// A primitive could not be allocated. Carries the name of the primitive.
    Resource(String),
    /// The first-reader callback refused entry.
    Callback(&'static str),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Timeout => write!(f, "lock not acquired before timeout"),
            Error::InvalidState => write!(f, "operation invalid in current lock state"),
            Error::Resource(name) => write!(f, "could not allocate primitive `{name}`"),
            Error::Callback(reason) => write!(f, "first-reader callback failed: {reason}"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::Error;

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    #[test]
    fn display_names_the_primitive() {
        let e = Error::Resource("wifi_rw_mutex".to_string());
        assert_eq!(e.to_string(), "could not allocate primitive `wifi_rw_mutex`");
        assert_eq!(
            Error::Callback("radio off").to_string(),
            "first-reader callback failed: radio off"
        );
    }
}
