//! Dispatch loop: blocking move from waiting to working, forever.

use crate::event::{EventKind, StoreOp};
use crate::store::ListStore;
use crate::telemetry::metrics;
use opentelemetry::KeyValue;
use tracing::{debug, error, warn};

use super::worker::Worker;

impl<S: ListStore> Worker<S> {
    /// Fetch records until shutdown.
    ///
    /// Each record is handed to its own runner task and the loop re-arms
    /// straight away, without waiting for the job to finish.
    pub(crate) async fn fetch_loop(self) {
        let mut failures = 0u32;
        loop {
            let fetched = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                fetched = self.popper.atomic_move(&self.keys.waiting, &self.keys.working) => fetched,
            };

            match fetched {
                Ok(record) => {
                    failures = 0;
                    self.dispatch(record);
                }
                Err(e) => {
                    if self.shutdown.is_cancelled() {
                        break;
                    }
                    failures += 1;
                    warn!(worker_id = %self.id, failures, error = %e, "fetch failed");
                    metrics::store_errors()
                        .add(1, &[KeyValue::new("operation", StoreOp::Fetch.to_string())]);
                    self.events.emit(EventKind::StoreError {
                        operation: StoreOp::Fetch,
                        error: e.to_string(),
                    });

                    let delay = if e.is_transient() {
                        self.config.retry.next_delay(failures)
                    } else {
                        None
                    };
                    let Some(delay) = delay else {
                        error!(worker_id = %self.id, attempts = failures, "fetcher stopped");
                        self.events.emit(EventKind::RetriesExhausted {
                            operation: StoreOp::Fetch,
                            attempts: failures,
                        });
                        break;
                    };
                    if !self.pause(delay).await {
                        break;
                    }
                }
            }
        }
        debug!(worker_id = %self.id, "fetcher stopped");
    }

    fn dispatch(&self, record: Vec<u8>) {
        let worker = self.clone();
        self.tasks.spawn(async move { worker.run(record).await });
    }
}
