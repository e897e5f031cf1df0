//! Wire format and scheduling arithmetic of job entries.

use chrono::{TimeZone, Utc};
use jobby::model::{JobEntry, QueueKeys};
use jobby::Schedule;
use serde_json::{Value, json};
use std::time::Duration;

const HOUR_MS: i64 = 60 * 60 * 1000;

#[test]
fn encodes_with_short_field_names() {
    let entry = JobEntry::new("send-email", json!({"to": "a@b.com"}), 1_700_000_000_000);
    let wire: Value = serde_json::from_slice(&entry.encode().unwrap()).unwrap();
    assert_eq!(
        wire,
        json!({"t": 1_700_000_000_000i64, "n": "send-email", "o": {"to": "a@b.com"}})
    );

    let claimed = entry.claimed(1_700_000_000_500);
    let wire: Value = serde_json::from_slice(&claimed.encode().unwrap()).unwrap();
    assert_eq!(wire["w"], json!(1_700_000_000_500i64));
}

#[test]
fn decodes_records_from_older_producers() {
    let entry =
        JobEntry::decode(br#"{"t":1700000000000,"n":"send-email","o":{"to":"a@b.com"}}"#).unwrap();
    assert_eq!(entry.scheduled_at, 1_700_000_000_000);
    assert_eq!(entry.name, "send-email");
    assert_eq!(entry.payload, json!({"to": "a@b.com"}));
    assert_eq!(entry.claimed_at, None);

    // A job pushed without a payload.
    let entry = JobEntry::decode(br#"{"t":5,"n":"tick"}"#).unwrap();
    assert_eq!(entry.payload, Value::Null);
}

#[test]
fn rejects_malformed_records() {
    assert!(JobEntry::decode(b"not json").is_err());
    assert!(JobEntry::decode(br#"{"n":"missing time"}"#).is_err());
    assert!(JobEntry::decode(br#"{"t":"soon","n":"x"}"#).is_err());
}

#[test]
fn stamp_is_removed_when_going_back_to_waiting() {
    let entry = JobEntry::new("job", json!([1, 2, 3]), 42);
    let claimed = entry.claimed(100);
    assert_eq!(claimed.claimed_at, Some(100));
    assert_eq!(claimed.scheduled_at, 42);
    assert_ne!(claimed.encode().unwrap(), entry.encode().unwrap());
    assert_eq!(claimed.unclaimed(), entry);
    assert_eq!(claimed.unclaimed().encode().unwrap(), entry.encode().unwrap());
}

#[test]
fn due_checks() {
    let entry = JobEntry::new("job", Value::Null, 1_000);
    assert!(!entry.is_due(999));
    assert!(entry.is_due(1_000));
    assert!(entry.is_due(5_000));

    assert_eq!(entry.delay_until_due(400), Some(Duration::from_millis(600)));
    assert_eq!(entry.delay_until_due(1_000), None);
    assert_eq!(entry.delay_until_due(2_000), None);
}

#[test]
fn reap_deadline_counts_from_entering_working() {
    let timeout = Duration::from_secs(3600);

    let unclaimed = JobEntry::new("job", Value::Null, 10 * HOUR_MS);
    assert_eq!(unclaimed.reap_deadline(timeout), 11 * HOUR_MS);

    // Old job picked up late: timeout runs from the claim.
    let late = JobEntry::new("job", Value::Null, HOUR_MS).claimed(10 * HOUR_MS);
    assert_eq!(late.reap_deadline(timeout), 11 * HOUR_MS);

    // Parked until it is due: timeout runs from the due time.
    let parked = JobEntry::new("job", Value::Null, 20 * HOUR_MS).claimed(10 * HOUR_MS);
    assert_eq!(parked.reap_deadline(timeout), 21 * HOUR_MS);
}

#[test]
fn schedule_resolution() {
    let now = 1_700_000_000_000;
    assert_eq!(Schedule::Now.resolve(now), now);
    assert_eq!(Schedule::default(), Schedule::Now);
    assert_eq!(
        Schedule::After(Duration::from_millis(1500)).resolve(now),
        now + 1500
    );

    let at = Utc.timestamp_millis_opt(1_800_000_000_000).unwrap();
    assert_eq!(Schedule::At(at).resolve(now), 1_800_000_000_000);
    // A time in the past is simply due.
    let past = Utc.timestamp_millis_opt(1_000).unwrap();
    assert_eq!(Schedule::from(past).resolve(now), 1_000);

    assert_eq!(
        Schedule::from(Duration::from_secs(5)),
        Schedule::After(Duration::from_secs(5))
    );
}

#[test]
fn queue_keys_use_prefix() {
    let keys = QueueKeys::new("jobby");
    assert_eq!(keys.waiting, "jobby:waiting");
    assert_eq!(keys.working, "jobby:working");
}

#[test]
fn extreme_schedule_times_do_not_overflow() {
    let timeout = Duration::from_secs(3600);
    let now = 1_700_000_000_000;

    let ancient = JobEntry::decode(br#"{"t":-9223372036854775808,"n":"x","o":null}"#).unwrap();
    assert_eq!(ancient.scheduled_at, i64::MIN);
    assert!(ancient.is_due(now));
    assert_eq!(ancient.delay_until_due(now), None);
    assert!(ancient.reap_deadline(timeout) < now);

    let distant = JobEntry::new("x", Value::Null, i64::MAX);
    assert!(!distant.is_due(now));
    assert!(distant.delay_until_due(i64::MIN).is_some());
    assert_eq!(distant.claimed(now).reap_deadline(timeout), i64::MAX);

    assert_eq!(Schedule::After(Duration::MAX).resolve(now), i64::MAX);
}
