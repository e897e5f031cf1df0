//! Redis list operations via the redis crate.
//!
//! Calls LPUSH, BRPOPLPUSH, LREM and LRANGE through a tokio
//! `ConnectionManager`. A worker opens two of these: BRPOPLPUSH holds its
//! connection until a record arrives, so it must not share one with the
//! writes.
//!
//! The manager re-establishes a dropped connection in the background. The
//! call that saw the drop fails with a transient error; a retried call goes
//! out on the new connection.

use crate::config::secrets::{ExposeSecret, SecretString};
use crate::error::{Error, Result};
use redis::aio::ConnectionManager;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use super::ListStore;

/// One Redis connection handle.
pub struct RedisStore {
    conn: Mutex<Option<ConnectionManager>>,
}

impl RedisStore {
    /// Connect using a `redis://[:password@]host[:port][/db]` URL.
    ///
    /// The password and database index in the URL are applied on connect
    /// and again on every reconnect.
    pub async fn connect(url: &SecretString) -> Result<Self> {
        let client = redis::Client::open(url.expose_secret())?;
        let conn = client.get_connection_manager().await?;
        debug!(db = client.get_connection_info().redis.db, "redis connection opened");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Server-side id of the current connection (`CLIENT ID`).
    pub async fn client_id(&self) -> Result<i64> {
        let mut conn = self.connection()?;
        Ok(redis::cmd("CLIENT").arg("ID").query_async(&mut conn).await?)
    }

    fn connection(&self) -> Result<ConnectionManager> {
        self.conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::Closed)
    }
}

impl ListStore for RedisStore {
    async fn push(&self, list: &str, record: &[u8]) -> Result<()> {
        let mut conn = self.connection()?;
        let _len: i64 = redis::cmd("LPUSH")
            .arg(list)
            .arg(record)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn atomic_move(&self, source: &str, destination: &str) -> Result<Vec<u8>> {
        let mut conn = self.connection()?;
        loop {
            let record: Option<Vec<u8>> = redis::cmd("BRPOPLPUSH")
                .arg(source)
                .arg(destination)
                .arg(0)
                .query_async(&mut conn)
                .await?;
            if let Some(record) = record {
                return Ok(record);
            }
        }
    }

    async fn remove_one(&self, list: &str, record: &[u8]) -> Result<bool> {
        let mut conn = self.connection()?;
        let removed: i64 = redis::cmd("LREM")
            .arg(list)
            .arg(1)
            .arg(record)
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn range(&self, list: &str) -> Result<Vec<Vec<u8>>> {
        let mut conn = self.connection()?;
        let records: Vec<Vec<u8>> = redis::cmd("LRANGE")
            .arg(list)
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;
        Ok(records)
    }

    async fn close(&self) {
        // Dropping the last clone of the manager closes the socket once
        // in-flight replies have drained.
        let taken = self
            .conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if taken.is_some() {
            debug!("redis connection closed");
        }
    }
}
