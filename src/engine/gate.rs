//! Gate in front of handler invocation.
//!
//! The fetcher never waits for handlers, so without a limit any number of
//! handlers may run at once. A limited gate holds back handler starts until
//! a slot frees up; fetched jobs wait in working meanwhile.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone)]
pub enum ConcurrencyGate {
    Unbounded,
    Limited(Arc<Semaphore>),
}

/// Held for the duration of one handler invocation.
pub struct GatePermit {
    _permit: Option<OwnedSemaphorePermit>,
}

impl ConcurrencyGate {
    pub fn new(max_concurrent: Option<usize>) -> Self {
        match max_concurrent {
            Some(n) => ConcurrencyGate::Limited(Arc::new(Semaphore::new(n.max(1)))),
            None => ConcurrencyGate::Unbounded,
        }
    }

    pub async fn acquire(&self) -> GatePermit {
        let permit = match self {
            ConcurrencyGate::Unbounded => None,
            // The semaphore is never closed, so acquisition only fails if it
            // somehow is; treat that as an open gate.
            ConcurrencyGate::Limited(sem) => Arc::clone(sem).acquire_owned().await.ok(),
        };
        GatePermit { _permit: permit }
    }

    /// Free slots, or `None` when unbounded.
    pub fn available(&self) -> Option<usize> {
        match self {
            ConcurrencyGate::Unbounded => None,
            ConcurrencyGate::Limited(sem) => Some(sem.available_permits()),
        }
    }
}
