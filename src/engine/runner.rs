//! Job runner: stamp, defer or execute, then remove or requeue.

use crate::error::Result;
use crate::event::{EventKind, RequeueReason, StoreOp};
use crate::model::{JobEntry, now_ms};
use crate::store::ListStore;
use crate::telemetry::job::{record_transition, start_job_span};
use crate::telemetry::metrics;
use opentelemetry::KeyValue;
use std::time::{Duration, Instant};
use tracing::{Instrument, Span, debug, error, info, warn};

use super::worker::Worker;

impl<S: ListStore> Worker<S> {
    /// Handle one record just moved into working.
    pub(crate) async fn run(&self, record: Vec<u8>) {
        let entry = match JobEntry::decode(&record) {
            Ok(entry) => entry,
            Err(e) => {
                self.discard_malformed(&record, &e.to_string()).await;
                return;
            }
        };
        let span = start_job_span(&entry.name, &self.id);
        self.run_entry(record, entry).instrument(span).await
    }

    async fn run_entry(&self, record: Vec<u8>, entry: JobEntry) {
        let Some((claimed_record, entry)) = self.claim(&record, &entry).await else {
            return;
        };
        record_transition(&Span::current(), "waiting", "working");

        match entry.delay_until_due(now_ms()) {
            Some(delay) => self.defer(&claimed_record, &entry, delay).await,
            None => self.execute(&claimed_record, &entry).await,
        }
    }

    /// Replace the fetched record with a copy stamped with the time it
    /// entered working. Returns the stamped bytes, which identify the entry
    /// from here on.
    ///
    /// If the stamped copy cannot be written the job is abandoned to the
    /// reaper. If only the unstamped original cannot be removed, the job
    /// still runs; the reaper later redelivers the leftover copy.
    async fn claim(&self, record: &[u8], entry: &JobEntry) -> Option<(Vec<u8>, JobEntry)> {
        let claimed = entry.claimed(now_ms());
        let claimed_record = match claimed.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "cannot encode claimed entry");
                return None;
            }
        };

        let pusher = &*self.pusher;
        let working = self.keys.working.as_str();
        let stamped = claimed_record.as_slice();
        if let Err(e) = self
            .retry(StoreOp::Push, move || pusher.push(working, stamped))
            .await
        {
            warn!(error = %e, "could not claim job; leaving it for the reaper");
            return None;
        }
        if let Err(e) = self
            .retry(StoreOp::Remove, move || pusher.remove_one(working, record))
            .await
        {
            warn!(error = %e, "could not drop unclaimed copy from working");
        }
        Some((claimed_record, claimed))
    }

    /// Park a job that is not due yet, then hand it back to waiting.
    ///
    /// On shutdown the timer is dropped and the job stays in working until
    /// the reaper recovers it.
    async fn defer(&self, record: &[u8], entry: &JobEntry, delay: Duration) {
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        debug!(job = %entry.name, delay_ms, "job not due, deferring");
        self.events.emit(EventKind::JobDeferred {
            name: entry.name.clone(),
            delay_ms,
        });

        if !self.pause(delay).await {
            debug!(job = %entry.name, "deferral cancelled by shutdown");
            return;
        }
        if let Err(e) = self.requeue(record, entry, RequeueReason::Due).await {
            warn!(job = %entry.name, error = %e, "could not requeue deferred job");
        }
    }

    /// Invoke the handler and settle the outcome.
    async fn execute(&self, record: &[u8], entry: &JobEntry) {
        let _permit = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                debug!(job = %entry.name, "shutdown while waiting for a handler slot");
                return;
            }
            permit = self.gate.acquire() => permit,
        };
        let _in_flight = self.in_flight.begin();

        let Some(handler) = self.registry.get(&entry.name) else {
            error!(job = %entry.name, "no handler registered; job stays in working");
            self.events.emit(EventKind::MissingHandler {
                name: entry.name.clone(),
            });
            return;
        };

        record_transition(&Span::current(), "working", "running");
        let started = Instant::now();
        // Run on its own task so a panicking handler still counts as a
        // completion.
        let outcome = match tokio::spawn(handler(entry.payload.clone())).await {
            Ok(result) => result,
            Err(e) => Err(anyhow::anyhow!("handler panicked: {e}")),
        };
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        metrics::job_duration_ms().record(
            duration_ms as f64,
            &[KeyValue::new("job", entry.name.clone())],
        );

        match outcome {
            Ok(()) => {
                if let Err(e) = self.acknowledge(record).await {
                    warn!(job = %entry.name, error = %e, "could not remove completed job");
                }
                record_transition(&Span::current(), "running", "completed");
                info!(job = %entry.name, duration_ms, "job completed");
                metrics::jobs_completed().add(1, &[KeyValue::new("job", entry.name.clone())]);
                self.events.emit(EventKind::JobCompleted {
                    name: entry.name.clone(),
                    duration_ms,
                });
            }
            Err(e) => {
                record_transition(&Span::current(), "running", "failed");
                warn!(job = %entry.name, duration_ms, error = %e, "job failed");
                metrics::jobs_failed().add(1, &[KeyValue::new("job", entry.name.clone())]);
                self.events.emit(EventKind::HandlerFailed {
                    name: entry.name.clone(),
                    error: format!("{e:#}"),
                    payload: entry.payload.clone(),
                });
                if let Err(e) = self.requeue(record, entry, RequeueReason::Failed).await {
                    warn!(job = %entry.name, error = %e, "could not requeue failed job");
                }
            }
        }
    }

    /// Remove a finished job from working. A missing record is not an error.
    pub(crate) async fn acknowledge(&self, record: &[u8]) -> Result<bool> {
        let pusher = &*self.pusher;
        let working = self.keys.working.as_str();
        self.retry(StoreOp::Remove, move || pusher.remove_one(working, record))
            .await
    }

    /// Push an unstamped copy back to waiting, then remove `record` from
    /// working. In that order, so a crash in between duplicates the job
    /// rather than losing it.
    pub(crate) async fn requeue(
        &self,
        record: &[u8],
        entry: &JobEntry,
        reason: RequeueReason,
    ) -> Result<()> {
        let waiting_record = entry.unclaimed().encode()?;
        let pusher = &*self.pusher;
        let waiting = self.keys.waiting.as_str();
        let fresh = waiting_record.as_slice();
        self.retry(StoreOp::Push, move || pusher.push(waiting, fresh))
            .await?;
        self.acknowledge(record).await?;

        debug!(job = %entry.name, %reason, "job requeued");
        metrics::jobs_requeued().add(
            1,
            &[
                KeyValue::new("job", entry.name.clone()),
                KeyValue::new("reason", reason.to_string()),
            ],
        );
        self.events.emit(EventKind::JobRequeued {
            name: entry.name.clone(),
            reason,
        });
        Ok(())
    }

    /// Drop a record no handler could ever accept, reporting its bytes.
    pub(crate) async fn discard_malformed(&self, record: &[u8], error: &str) {
        error!(worker_id = %self.id, error, "malformed record in working; discarding");
        self.events.emit(EventKind::MalformedRecord {
            error: error.to_string(),
            record: String::from_utf8_lossy(record).into_owned(),
        });
        if let Err(e) = self.acknowledge(record).await {
            warn!(error = %e, "could not remove malformed record");
        }
    }
}
