//! Core data model.
//!
//! A job entry is the unit stored in both the waiting and the working list.
//! Its serialized bytes are its identity: the store removes entries by value,
//! so the engine always removes exactly the bytes it read or wrote.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;

// ---------------------------------------------------------------------------
// Job Entry
// ---------------------------------------------------------------------------

/// A job as it lives in the store.
///
/// Field names on the wire are kept short (`t`, `n`, `o`) so that records
/// written by older producers decode unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEntry {
    /// Earliest execution time, epoch millis. Never changes after creation.
    #[serde(rename = "t")]
    pub scheduled_at: i64,

    /// Handler name.
    #[serde(rename = "n")]
    pub name: String,

    /// Opaque payload handed to the handler.
    #[serde(rename = "o", default)]
    pub payload: serde_json::Value,

    /// When the entry most recently entered the working list, epoch millis.
    /// Absent while the entry sits in waiting.
    #[serde(rename = "w", default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<i64>,
}

impl JobEntry {
    pub fn new(name: impl Into<String>, payload: serde_json::Value, scheduled_at: i64) -> Self {
        Self {
            scheduled_at,
            name: name.into(),
            payload,
            claimed_at: None,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(record: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(record)?)
    }

    /// Copy stamped with the time it entered working.
    pub fn claimed(&self, now_ms: i64) -> Self {
        Self {
            claimed_at: Some(now_ms),
            ..self.clone()
        }
    }

    /// Copy without the working stamp, as pushed back to waiting.
    pub fn unclaimed(&self) -> Self {
        Self {
            claimed_at: None,
            ..self.clone()
        }
    }

    pub fn is_due(&self, now_ms: i64) -> bool {
        self.scheduled_at <= now_ms
    }

    /// Time left before the entry may run, or `None` if it is due.
    pub fn delay_until_due(&self, now_ms: i64) -> Option<Duration> {
        let offset = self.scheduled_at.saturating_sub(now_ms);
        (offset > 0).then(|| Duration::from_millis(offset as u64))
    }

    /// Instant (epoch millis) after which a working entry counts as abandoned.
    ///
    /// Measured from when the entry entered working, but never before the
    /// entry is due, so a deferred job is not mistaken for a stuck one.
    pub fn reap_deadline(&self, job_timeout: Duration) -> i64 {
        let entered = self.claimed_at.unwrap_or(self.scheduled_at);
        entered
            .max(self.scheduled_at)
            .saturating_add(duration_ms(job_timeout))
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// When a pushed job becomes eligible to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schedule {
    #[default]
    Now,
    /// Relative to the moment of the push.
    After(Duration),
    /// Absolute time.
    At(DateTime<Utc>),
}

impl Schedule {
    /// Resolve to epoch millis against `now_ms`.
    pub fn resolve(self, now_ms: i64) -> i64 {
        match self {
            Schedule::Now => now_ms,
            Schedule::After(delay) => now_ms.saturating_add(duration_ms(delay)),
            Schedule::At(at) => at.timestamp_millis(),
        }
    }
}

impl From<Duration> for Schedule {
    fn from(delay: Duration) -> Self {
        Schedule::After(delay)
    }
}

impl From<DateTime<Utc>> for Schedule {
    fn from(at: DateTime<Utc>) -> Self {
        Schedule::At(at)
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// The two list names derived from a key namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    pub waiting: String,
    pub working: String,
}

impl QueueKeys {
    pub fn new(prefix: &str) -> Self {
        Self {
            waiting: format!("{prefix}:waiting"),
            working: format!("{prefix}:working"),
        }
    }
}

/// Current wall-clock time in epoch millis.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}
