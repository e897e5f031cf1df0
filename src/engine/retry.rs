//! Retry policy for store operations.
//!
//! The default retries forever with no pause: a requeue or remove that never
//! lands leaves a job in an ambiguous state. Against a store that stays down
//! this is a hot loop, so a bound and an exponential backoff can be
//! configured instead.

use crate::error::Result;
use crate::event::{EventKind, EventSink, StoreOp};
use crate::telemetry::metrics;
use opentelemetry::KeyValue;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Pause between consecutive failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Retry immediately.
    #[default]
    None,
    /// Double the pause after each failure, starting at `initial`, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Exponential backoff capped at 64 times the initial pause.
    pub fn exponential(initial: Duration) -> Self {
        Backoff::Exponential {
            initial,
            max: initial.saturating_mul(64),
        }
    }

    /// Pause after the `failures`-th consecutive failure (1-based).
    pub fn delay(&self, failures: u32) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Exponential { initial, max } => {
                let shift = failures.saturating_sub(1).min(31);
                initial.saturating_mul(1u32 << shift).min(max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// Total attempts before giving up. `None` retries forever.
    pub max_attempts: Option<u32>,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Retry forever, immediately.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn bounded(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            backoff,
        }
    }

    /// Pause before the next attempt after `failures` consecutive failures,
    /// or `None` once the attempt budget is spent.
    pub fn next_delay(&self, failures: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if failures >= max.max(1) => None,
            _ => Some(self.backoff.delay(failures)),
        }
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is spent. Every failure is reported on `events`.
    pub(crate) async fn run<T, F, Fut>(
        &self,
        operation: StoreOp,
        events: &EventSink,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut failures = 0u32;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            failures += 1;
            warn!(%operation, failures, error = %err, "store operation failed");
            metrics::store_errors().add(1, &[KeyValue::new("operation", operation.to_string())]);
            events.emit(EventKind::StoreError {
                operation,
                error: err.to_string(),
            });

            if !err.is_transient() {
                return Err(err);
            }
            let Some(delay) = self.next_delay(failures) else {
                error!(%operation, attempts = failures, "store retries exhausted");
                events.emit(EventKind::RetriesExhausted {
                    operation,
                    attempts: failures,
                });
                return Err(err);
            };
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }
        }
    }
}
