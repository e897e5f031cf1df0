//! Integration tests for telemetry initialization and span helpers.

use uuid::Uuid;

#[test]
fn telemetry_initializes_without_endpoint() {
    // Note: tracing subscriber can only be set once per process.
    // Using try_init() in the implementation avoids panics if another
    // test already initialized a subscriber.
    let config = jobby::telemetry::TelemetryConfig {
        endpoint: None,
        service_name: "jobby-test".to_string(),
        log_level: "debug".to_string(),
    };
    // This may return Err if a global subscriber was already set by
    // another test in this process; that is acceptable.
    let _guard = jobby::telemetry::init_telemetry(config);
}

#[test]
fn job_span_creates_and_records_transition() {
    let id = Uuid::new_v4();
    let span = jobby::telemetry::job::start_job_span("send-email", &id);
    jobby::telemetry::job::record_transition(&span, "waiting", "working");
    jobby::telemetry::job::record_transition(&span, "working", "completed");
}

#[test]
fn metric_instruments_build_against_the_global_meter() {
    use opentelemetry::KeyValue;
    use jobby::telemetry::metrics;

    metrics::jobs_pushed().add(1, &[KeyValue::new("job", "send-email")]);
    metrics::jobs_requeued().add(1, &[KeyValue::new("reason", "failed")]);
    metrics::job_duration_ms().record(12.5, &[KeyValue::new("job", "send-email")]);
}
