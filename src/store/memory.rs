//! In-process list store with the same semantics as the Redis adapter.
//!
//! Several handles can share one backend, the way two Redis connections
//! share one server. Each handle can be told to fail its next calls, which
//! is how tests simulate an unavailable store.

use crate::error::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

use super::ListStore;

#[derive(Default)]
struct Backend {
    lists: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
    pushed: Notify,
}

impl Backend {
    fn lists(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Vec<u8>>>> {
        self.lists.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct HandleState {
    closed: AtomicBool,
    failures: AtomicUsize,
}

/// A connection handle onto an in-memory backend.
///
/// `clone()` returns the same handle; [`MemoryStore::connection`] opens a
/// new handle onto the same lists.
#[derive(Clone, Default)]
pub struct MemoryStore {
    backend: Arc<Backend>,
    state: Arc<HandleState>,
}

impl MemoryStore {
    /// Create an empty backend and a first handle onto it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open another handle onto the same backend.
    pub fn connection(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            state: Arc::new(HandleState::default()),
        }
    }

    /// Make the next `n` operations on this handle fail.
    pub fn fail_next(&self, n: usize) {
        self.state.failures.store(n, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Snapshot of `list`, head first.
    pub fn snapshot(&self, list: &str) -> Vec<Vec<u8>> {
        self.backend
            .lists()
            .get(list)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, list: &str) -> usize {
        self.backend.lists().get(list).map_or(0, VecDeque::len)
    }

    fn check(&self, op: &str) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let injected = self
            .state
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(Error::Store(format!("injected failure on {op}")));
        }
        Ok(())
    }

    fn try_move(&self, source: &str, destination: &str) -> Option<Vec<u8>> {
        let mut lists = self.backend.lists();
        let record = lists.get_mut(source)?.pop_back()?;
        lists
            .entry(destination.to_string())
            .or_default()
            .push_front(record.clone());
        Some(record)
    }
}

impl ListStore for MemoryStore {
    async fn push(&self, list: &str, record: &[u8]) -> Result<()> {
        self.check("push")?;
        self.backend
            .lists()
            .entry(list.to_string())
            .or_default()
            .push_front(record.to_vec());
        self.backend.pushed.notify_waiters();
        Ok(())
    }

    async fn atomic_move(&self, source: &str, destination: &str) -> Result<Vec<u8>> {
        self.check("atomic_move")?;
        loop {
            let pushed = self.backend.pushed.notified();
            tokio::pin!(pushed);
            pushed.as_mut().enable();

            if let Some(record) = self.try_move(source, destination) {
                return Ok(record);
            }
            pushed.await;
            if self.is_closed() {
                return Err(Error::Closed);
            }
        }
    }

    async fn remove_one(&self, list: &str, record: &[u8]) -> Result<bool> {
        self.check("remove_one")?;
        let mut lists = self.backend.lists();
        let Some(entries) = lists.get_mut(list) else {
            return Ok(false);
        };
        match entries.iter().position(|r| r.as_slice() == record) {
            Some(index) => {
                entries.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn range(&self, list: &str) -> Result<Vec<Vec<u8>>> {
        self.check("range")?;
        Ok(self.snapshot(list))
    }

    async fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
        // Wake a blocked move so it observes the close.
        self.backend.pushed.notify_waiters();
    }
}
