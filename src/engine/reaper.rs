//! Reaper: requeue jobs abandoned in the working list.

use crate::error::Result;
use crate::event::{EventKind, RequeueReason, StoreOp};
use crate::model::{JobEntry, now_ms};
use crate::store::ListStore;
use crate::telemetry::metrics;
use opentelemetry::KeyValue;
use tracing::{debug, warn};

use super::worker::Worker;

impl<S: ListStore> Worker<S> {
    /// Run a cleanup pass now and then every `cleanup_interval`, until
    /// shutdown.
    pub(crate) async fn reap_loop(self) {
        loop {
            match self.cleanup().await {
                Ok(0) => {}
                Ok(requeued) => debug!(worker_id = %self.id, requeued, "cleanup pass done"),
                Err(e) => debug!(worker_id = %self.id, error = %e, "cleanup pass aborted"),
            }
            if !self.pause(self.config.cleanup_interval).await {
                break;
            }
        }
        debug!(worker_id = %self.id, "reaper stopped");
    }

    /// One scan of the working list. Every entry that has sat in working
    /// past its deadline is pushed back to waiting. Returns how many were.
    ///
    /// The deadline runs from when the entry entered working, and never ends
    /// before the entry is due, so jobs parked on a delay are left alone.
    pub async fn cleanup(&self) -> Result<usize> {
        let pusher = &*self.pusher;
        let working = self.keys.working.as_str();
        let records = self
            .retry(StoreOp::Range, move || pusher.range(working))
            .await?;

        let now = now_ms();
        let mut requeued = 0;
        for record in records {
            let entry = match JobEntry::decode(&record) {
                Ok(entry) => entry,
                Err(e) => {
                    self.discard_malformed(&record, &e.to_string()).await;
                    continue;
                }
            };
            let deadline = entry.reap_deadline(self.config.job_timeout);
            if deadline >= now {
                continue;
            }

            let overdue_ms = u64::try_from(now.saturating_sub(deadline)).unwrap_or(0);
            warn!(job = %entry.name, overdue_ms, "reaping abandoned job");
            metrics::jobs_reaped().add(1, &[KeyValue::new("job", entry.name.clone())]);
            self.events.emit(EventKind::JobReaped {
                name: entry.name.clone(),
                overdue_ms,
            });
            match self.requeue(&record, &entry, RequeueReason::Reaped).await {
                Ok(()) => requeued += 1,
                Err(e) => warn!(job = %entry.name, error = %e, "could not requeue reaped job"),
            }
        }
        Ok(requeued)
    }
}
