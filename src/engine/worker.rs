//! Worker: owns both store connections and drives fetch, run and reap.

use crate::config::WorkerConfig;
use crate::config::secrets::SecretString;
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, EventSink, StoreOp};
use crate::handler::HandlerRegistry;
use crate::model::{JobEntry, QueueKeys, Schedule};
use crate::store::{ListStore, RedisStore};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};
use uuid::Uuid;

use super::gate::ConcurrencyGate;
use super::inflight::InFlight;
use super::producer::Producer;

#[derive(Default)]
struct Lifecycle {
    started: AtomicBool,
    loops: Mutex<Vec<JoinHandle<()>>>,
    /// Held for the whole of `disconnect`; `true` once the write
    /// connection is closed.
    closed: tokio::sync::Mutex<bool>,
}

/// A queue worker.
///
/// The blocking connection (`popper`) is used only for the atomic move;
/// everything else goes through `pusher`.
pub struct Worker<S> {
    pub(crate) id: Uuid,
    pub(crate) keys: QueueKeys,
    pub(crate) popper: Arc<S>,
    pub(crate) pusher: Arc<S>,
    pub(crate) producer: Producer<S>,
    pub(crate) registry: Arc<HandlerRegistry>,
    pub(crate) config: WorkerConfig,
    pub(crate) events: EventSink,
    pub(crate) in_flight: InFlight,
    pub(crate) gate: ConcurrencyGate,
    /// Cancelled on disconnect: aborts the blocking fetch and every timer.
    pub(crate) shutdown: CancellationToken,
    pub(crate) tasks: TaskTracker,
    lifecycle: Arc<Lifecycle>,
}

impl<S> Clone for Worker<S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            keys: self.keys.clone(),
            popper: Arc::clone(&self.popper),
            pusher: Arc::clone(&self.pusher),
            producer: self.producer.clone(),
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
            events: self.events.clone(),
            in_flight: self.in_flight.clone(),
            gate: self.gate.clone(),
            shutdown: self.shutdown.clone(),
            tasks: self.tasks.clone(),
            lifecycle: Arc::clone(&self.lifecycle),
        }
    }
}

impl Worker<RedisStore> {
    /// Open the two Redis connections a worker needs.
    pub async fn connect(
        url: &SecretString,
        registry: HandlerRegistry,
        config: WorkerConfig,
    ) -> Result<Self> {
        let popper = RedisStore::connect(url).await?;
        let pusher = RedisStore::connect(url).await?;
        Ok(Self::new(popper, pusher, registry, config))
    }
}

impl<S: ListStore> Worker<S> {
    /// Build a worker from a blocking connection and a write connection.
    /// They must be distinct handles, owned by this worker alone.
    pub fn new(popper: S, pusher: S, registry: HandlerRegistry, config: WorkerConfig) -> Self {
        let id = Uuid::new_v4();
        let pusher = Arc::new(pusher);
        Self {
            id,
            keys: QueueKeys::new(&config.key),
            popper: Arc::new(popper),
            producer: Producer::new(Arc::clone(&pusher), &config.key),
            pusher,
            registry: Arc::new(registry),
            events: EventSink::new(id, config.event_capacity),
            gate: ConcurrencyGate::new(config.max_concurrent),
            in_flight: InFlight::default(),
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
            lifecycle: Arc::new(Lifecycle::default()),
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn keys(&self) -> &QueueKeys {
        &self.keys
    }

    /// Handlers currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count()
    }

    pub fn is_disconnecting(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// A push-only handle sharing this worker's write connection.
    pub fn producer(&self) -> Producer<S> {
        self.producer.clone()
    }

    /// Another receiver on the event channel.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Append a job to the waiting list.
    pub async fn push(
        &self,
        name: &str,
        payload: serde_json::Value,
        schedule: impl Into<Schedule>,
    ) -> Result<JobEntry> {
        self.producer.push(name, payload, schedule).await
    }

    /// Arm the fetcher and the reaper. Returns a receiver on the event
    /// channel, subscribed before either loop emits anything.
    pub fn start(&self) -> Result<broadcast::Receiver<Event>> {
        if self.shutdown.is_cancelled() {
            return Err(Error::Disconnected);
        }
        if self.lifecycle.started.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyStarted);
        }
        let events = self.events.subscribe();

        let fetcher = tokio::spawn(self.clone().fetch_loop());
        let reaper = tokio::spawn(self.clone().reap_loop());
        self.lifecycle
            .loops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([fetcher, reaper]);

        let mut handlers: Vec<&str> = self.registry.names().collect();
        handlers.sort_unstable();
        info!(
            worker_id = %self.id,
            waiting = %self.keys.waiting,
            working = %self.keys.working,
            ?handlers,
            "worker started"
        );
        Ok(events)
    }

    /// Graceful shutdown.
    ///
    /// Aborts the blocking fetch, cancels pending timers, waits for running
    /// handlers to finish their remove or requeue, then closes the write
    /// connection. Jobs parked on a timer stay in working for the reaper.
    /// Safe to call more than once; later calls wait for the first.
    pub async fn disconnect(&self) {
        let mut closed = self.lifecycle.closed.lock().await;
        if *closed {
            return;
        }
        info!(worker_id = %self.id, in_flight = self.in_flight.count(), "disconnecting");

        self.shutdown.cancel();
        self.popper.close().await;

        let loops = std::mem::take(
            &mut *self
                .lifecycle
                .loops
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in loops {
            if let Err(e) = handle.await {
                error!(worker_id = %self.id, error = %e, "worker loop ended abnormally");
            }
        }

        self.tasks.close();
        self.tasks.wait().await;
        self.in_flight.wait_idle().await;

        self.pusher.close().await;
        *closed = true;
        self.events.emit(EventKind::Disconnected);
        info!(worker_id = %self.id, "disconnected");
    }

    /// Sleep for `delay` unless shutdown begins first. Returns `false` on
    /// shutdown.
    pub(crate) async fn pause(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            tokio::task::yield_now().await;
            return !self.shutdown.is_cancelled();
        }
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Run a write-side store operation under the configured retry policy.
    pub(crate) async fn retry<T, F, Fut>(&self, operation: StoreOp, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.config.retry.run(operation, &self.events, op).await
    }
}
