//! Metric instrument factories for jobby.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"jobby"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for jobby instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("jobby")
}

/// Counter: jobs pushed to the waiting list.
/// Labels: `job`, `result` ("ok" | "error").
pub fn jobs_pushed() -> Counter<u64> {
    meter()
        .u64_counter("jobby.jobs.pushed")
        .with_description("Number of jobs pushed")
        .build()
}

/// Counter: jobs whose handler succeeded.
/// Labels: `job`.
pub fn jobs_completed() -> Counter<u64> {
    meter()
        .u64_counter("jobby.jobs.completed")
        .with_description("Number of jobs completed")
        .build()
}

/// Counter: handler failures.
/// Labels: `job`.
pub fn jobs_failed() -> Counter<u64> {
    meter()
        .u64_counter("jobby.jobs.failed")
        .with_description("Number of handler failures")
        .build()
}

/// Counter: jobs pushed back to waiting.
/// Labels: `job`, `reason` ("due" | "failed" | "reaped").
pub fn jobs_requeued() -> Counter<u64> {
    meter()
        .u64_counter("jobby.jobs.requeued")
        .with_description("Number of jobs requeued")
        .build()
}

/// Counter: abandoned jobs found by the reaper.
/// Labels: `job`.
pub fn jobs_reaped() -> Counter<u64> {
    meter()
        .u64_counter("jobby.jobs.reaped")
        .with_description("Number of abandoned jobs reaped")
        .build()
}

/// Counter: failed store operations, retried or not.
/// Labels: `operation` ("fetch" | "push" | "remove" | "range").
pub fn store_errors() -> Counter<u64> {
    meter()
        .u64_counter("jobby.store.errors")
        .with_description("Number of failed store operations")
        .build()
}

/// Histogram: handler duration in milliseconds.
/// Labels: `job`.
pub fn job_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("jobby.job.duration_ms")
        .with_description("Handler duration in milliseconds")
        .with_unit("ms")
        .build()
}
