// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deadline-bounded acquisition strategies shared by every primitive.
//!
//! A primitive only has to say how to make one non-blocking attempt and where
//! its waiters live; blocking, spinning and async waiting are built on top.

use super::wait_list::WaitList;
use super::NotAvailable;
use crate::timeout::Deadline;
use crate::Error;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

#[cfg(target_arch = "wasm32")]
use wasm_safe_thread as thread;
#[cfg(not(target_arch = "wasm32"))]
use std::thread;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

pub(crate) trait Acquire {
    /// One non-blocking attempt.
    fn try_acquire(&self) -> Result<(), NotAvailable>;
    fn wait_list(&self) -> &WaitList;
}

/// Parks the current thread between attempts.
pub(crate) fn acquire_block<A: Acquire + ?Sized>(a: &A, deadline: Deadline) -> Result<(), Error> {
    loop {
        if deadline.expired() {
            // one last attempt
            return a.try_acquire().map_err(|_| Error::Timeout);
        }

        let r = a
            .wait_list()
            .sync_waiters
            .with_mut(|threads| match a.try_acquire() {
                Ok(()) => Ok(()),
                Err(NotAvailable) => {
                    let current = thread::current();
                    // still listed after a timeout or spurious wakeup
                    if !threads.iter().any(|t| t.id() == current.id()) {
                        threads.push(current);
                    }
                    Err(NotAvailable)
                }
            });

        match r {
            Ok(()) => return Ok(()),
            Err(NotAvailable) => match deadline.instant() {
                None => thread::park(),
                Some(at) => thread::park_timeout(at.saturating_duration_since(Instant::now())),
            },
        }
    }
}

/// Spins between attempts, for threads that are not allowed to block.
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
pub(crate) fn acquire_spin<A: Acquire + ?Sized>(a: &A, deadline: Deadline) -> Result<(), Error> {
    loop {
        if a.try_acquire().is_ok() {
            return Ok(());
        }
        if deadline.expired() {
            return Err(Error::Timeout);
        }
        std::hint::spin_loop();
    }
}

/// Blocks where the platform allows it and spins otherwise.
pub(crate) fn acquire_sync<A: Acquire + ?Sized>(a: &A, deadline: Deadline) -> Result<(), Error> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        acquire_block(a, deadline)
    }
    #[cfg(target_arch = "wasm32")]
    {
        if crate::wasm_support::atomics_wait_supported() {
            acquire_block(a, deadline)
        } else {
            acquire_spin(a, deadline)
        }
    }
}

pub(crate) async fn acquire_async<A: Acquire + ?Sized>(
    a: &A,
    deadline: Deadline,
) -> Result<(), Error> {
    loop {
        if deadline.expired() {
            return a.try_acquire().map_err(|_| Error::Timeout);
        }

        let r = a
            .wait_list()
            .async_waiters
            .with_mut(|senders| match a.try_acquire() {
                Ok(()) => Ok(()),
                Err(NotAvailable) => {
                    let (sender, receiver) = r#continue::continuation();
                    senders.push(sender);
                    Err(receiver)
                }
            });

        match r {
            Ok(()) => return Ok(()),
            Err(receiver) => match deadline.instant() {
                None => receiver.await,
                Some(at) => {
                    let timer = timeout_signal(at)?;
                    // Either way, the top of the loop decides whether to retry or give up.
                    Race {
                        notify: Some(receiver),
                        timeout: Some(timer),
                    }
                    .await;
                }
            },
        }
    }
}

/// Completes once `at` has passed, driven by a short-lived sleeper thread.
fn timeout_signal(at: Instant) -> Result<impl Future<Output = ()> + Unpin, Error> {
    let (sender, receiver) = r#continue::continuation();
    thread::Builder::new()
        .name("acquire_async_timeout".to_string())
        .spawn(move || {
            let now = Instant::now();
            if at > now {
                thread::sleep(at - now);
            }
            sender.send(());
        })
        .map_err(|_| Error::Resource("acquire_async_timeout".to_string()))?;
    Ok(receiver)
}

/// Resolves with whichever of the two futures finishes first; `true` means the timeout won.
struct Race<F1, F2> {
    notify: Option<F1>,
    timeout: Option<F2>,
}

impl<F1: Future + Unpin, F2: Future + Unpin> Future for Race<F1, F2> {
    type Output = bool;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(ref mut notify) = self.notify {
            if Pin::new(notify).poll(cx).is_ready() {
                self.notify = None;
                return Poll::Ready(false);
            }
        }
        if let Some(ref mut timeout) = self.timeout {
            if Pin::new(timeout).poll(cx).is_ready() {
                self.timeout = None;
                return Poll::Ready(true);
            }
        }
        Poll::Pending
    }
}
