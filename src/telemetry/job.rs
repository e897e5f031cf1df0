//! Job execution span helpers.
//!
//! Provides span creation and transition recording for jobs flowing
//! through a worker.

use tracing::Span;
use uuid::Uuid;

/// Start a span covering one fetched record, from claim to settlement.
pub fn start_job_span(job: &str, worker_id: &Uuid) -> Span {
    tracing::info_span!(
        "job.run",
        "messaging.system" = "redis",
        "job.name" = job,
        "worker.id" = %worker_id,
    )
}

/// Record a transition event on the given span.
pub fn record_transition(span: &Span, from: &str, to: &str) {
    span.in_scope(|| {
        tracing::debug!(from = from, to = to, "job_transition");
    });
}
