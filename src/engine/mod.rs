//! Queue engine: producer, and the worker's fetch / run / reap / shutdown
//! state machine.

mod fetcher;
pub mod gate;
pub mod inflight;
pub mod producer;
mod reaper;
pub mod retry;
mod runner;
pub mod worker;

pub use gate::ConcurrencyGate;
pub use inflight::InFlight;
pub use producer::Producer;
pub use retry::{Backoff, RetryPolicy};
pub use worker::Worker;
