//! Producer side: append jobs to the waiting list.

use crate::error::Result;
use crate::model::{JobEntry, QueueKeys, Schedule, now_ms};
use crate::store::ListStore;
use crate::telemetry::metrics;
use opentelemetry::KeyValue;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Push-only handle onto a queue.
pub struct Producer<S> {
    store: Arc<S>,
    keys: QueueKeys,
}

impl<S> Clone for Producer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            keys: self.keys.clone(),
        }
    }
}

impl<S: ListStore> Producer<S> {
    pub fn new(store: Arc<S>, key: &str) -> Self {
        Self {
            store,
            keys: QueueKeys::new(key),
        }
    }

    pub fn keys(&self) -> &QueueKeys {
        &self.keys
    }

    /// Append a job to the waiting list. A single attempt: store errors are
    /// returned to the caller.
    pub async fn push(
        &self,
        name: &str,
        payload: serde_json::Value,
        schedule: impl Into<Schedule>,
    ) -> Result<JobEntry> {
        let entry = JobEntry::new(name, payload, schedule.into().resolve(now_ms()));
        let record = entry.encode()?;
        let result = self.store.push(&self.keys.waiting, &record).await;
        metrics::jobs_pushed().add(
            1,
            &[
                KeyValue::new("job", name.to_string()),
                KeyValue::new("result", if result.is_ok() { "ok" } else { "error" }),
            ],
        );
        result?;
        debug!(job = name, scheduled_at = entry.scheduled_at, "job pushed");
        Ok(entry)
    }

    /// Like [`push`](Self::push) with any serializable payload.
    pub async fn push_json<T: Serialize>(
        &self,
        name: &str,
        payload: &T,
        schedule: impl Into<Schedule>,
    ) -> Result<JobEntry> {
        let payload = serde_json::to_value(payload)?;
        self.push(name, payload, schedule).await
    }
}
