// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts live primitives against an optional ceiling, like an RTOS heap
/// that can only hold so many kernel objects.
#[derive(Debug)]
pub(crate) struct HandleBudget {
    live: AtomicUsize,
    max: Option<usize>,
}

impl HandleBudget {
    pub(crate) fn new(max: Option<usize>) -> Self {
        HandleBudget {
            live: AtomicUsize::new(0),
            max,
        }
    }

    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Reserves one handle for the primitive `name`.
    pub(crate) fn claim(self: &Arc<Self>, name: &str) -> Result<Handle, Error> {
        let max = self.max.unwrap_or(usize::MAX);
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < max).then_some(live + 1)
            })
            .map_err(|live| {
                log::warn!("out of OS handles ({live} live), cannot create {name}");
                Error::Resource(name.to_string())
            })?;
        Ok(Handle {
            budget: Some(Arc::clone(self)),
        })
    }
}

/// One reserved slot; returned to its budget on drop.
#[derive(Debug)]
pub(crate) struct Handle {
    budget: Option<Arc<HandleBudget>>,
}

impl Handle {
    /// A handle for a primitive created outside any [`Os`](super::Os).
    pub(crate) const fn detached() -> Self {
        Handle { budget: None }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Some(budget) = &self.budget {
            budget.live.fetch_sub(1, Ordering::AcqRel);
        }
    }
}
