// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::spinlock::Spinlock;

#[cfg(target_arch = "wasm32")]
use wasm_safe_thread as thread;
#[cfg(not(target_arch = "wasm32"))]
use std::thread;

/// Threads and tasks waiting for a primitive to be released.
///
/// A waiter registers itself only after a failed attempt made while holding
/// the matching list, and a releaser publishes the release before draining
/// the list, so no wakeup is lost between the two.
#[derive(Debug)]
pub(crate) struct WaitList {
    pub(crate) sync_waiters: Spinlock<Vec<thread::Thread>>,
    pub(crate) async_waiters: Spinlock<Vec<r#continue::Sender<()>>>,
}

impl WaitList {
    pub(crate) const fn new() -> Self {
        WaitList {
            sync_waiters: Spinlock::new(Vec::new()),
            async_waiters: Spinlock::new(Vec::new()),
        }
    }

    /// Wakes every waiter; each one retries and at most the available ones win.
    pub(crate) fn wake_all(&self) {
        let threads = self.sync_waiters.with_mut(std::mem::take);
        for thread in threads {
            thread.unpark();
        }
        let senders = self.async_waiters.with_mut(std::mem::take);
        for sender in senders {
            sender.send(());
        }
    }

    #[cfg(test)]
    pub(crate) fn sync_waiter_count(&self) -> usize {
        self.sync_waiters.with_mut(|threads| threads.len())
    }
}

impl Drop for WaitList {
    fn drop(&mut self) {
        // Senders left behind by timed-out async waiters are completed, never dropped unsent.
        self.wake_all();
    }
}
