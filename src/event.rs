//! Structured events emitted by the engine.
//!
//! The event channel is where store errors, handler failures and other
//! conditions surface to the caller. The engine keeps going regardless:
//! nothing here is ever awaited by the engine, and a slow subscriber only
//! loses the oldest events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use uuid::Uuid;

/// A structured event emitted by a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic per-worker sequence number. Consumers can detect gaps.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub worker_id: Uuid,
    pub kind: EventKind,
}

/// Which store primitive an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOp {
    Fetch,
    Push,
    Remove,
    Range,
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StoreOp::Fetch => "fetch",
            StoreOp::Push => "push",
            StoreOp::Remove => "remove",
            StoreOp::Range => "range",
        };
        write!(f, "{s}")
    }
}

/// Why an entry went back to the waiting list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequeueReason {
    /// Its delay elapsed while parked in working.
    Due,
    /// The handler reported failure.
    Failed,
    /// The reaper found it abandoned.
    Reaped,
}

impl std::fmt::Display for RequeueReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequeueReason::Due => "due",
            RequeueReason::Failed => "failed",
            RequeueReason::Reaped => "reaped",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    StoreError {
        operation: StoreOp,
        error: String,
    },
    RetriesExhausted {
        operation: StoreOp,
        attempts: u32,
    },
    HandlerFailed {
        name: String,
        error: String,
        payload: serde_json::Value,
    },
    MissingHandler {
        name: String,
    },
    MalformedRecord {
        error: String,
        record: String,
    },
    JobCompleted {
        name: String,
        duration_ms: u64,
    },
    JobDeferred {
        name: String,
        delay_ms: u64,
    },
    JobRequeued {
        name: String,
        reason: RequeueReason,
    },
    JobReaped {
        name: String,
        overdue_ms: u64,
    },
    Disconnected,
}

/// Sending half of a worker's event channel.
#[derive(Clone)]
pub struct EventSink {
    worker_id: Uuid,
    seq: Arc<AtomicU64>,
    tx: broadcast::Sender<Event>,
}

impl EventSink {
    pub fn new(worker_id: Uuid, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            worker_id,
            seq: Arc::new(AtomicU64::new(0)),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, kind: EventKind) {
        let event = Event {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            timestamp: Utc::now(),
            worker_id: self.worker_id,
            kind,
        };
        let _ = self.tx.send(event);
    }
}
