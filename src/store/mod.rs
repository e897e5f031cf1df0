//! Store adapter: the four list primitives the engine is built on.
//!
//! A worker owns two handles. One is dedicated to the indefinitely-blocking
//! atomic move; the other carries every push, removal and range read. The
//! adapter never retries; each caller applies its own retry policy.

pub mod memory;
pub mod redis;

use crate::error::Result;
use std::future::Future;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Ordered lists of opaque byte records.
pub trait ListStore: Send + Sync + 'static {
    /// Append `record` at the head of `list`.
    fn push(&self, list: &str, record: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Block until `source` is non-empty, then atomically move its tail
    /// record to the head of `destination` and return it.
    fn atomic_move(
        &self,
        source: &str,
        destination: &str,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Remove one copy of `record` from `list`. Returns whether a copy was
    /// found; removing a missing record is a no-op.
    fn remove_one(&self, list: &str, record: &[u8]) -> impl Future<Output = Result<bool>> + Send;

    /// Every record of `list`, head first.
    fn range(&self, list: &str) -> impl Future<Output = Result<Vec<Vec<u8>>>> + Send;

    /// Release the connection. Later calls fail with `Error::Closed`.
    fn close(&self) -> impl Future<Output = ()> + Send;
}
