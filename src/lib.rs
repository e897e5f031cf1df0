//! # jobby
//!
//! Durable, at-least-once, delay-capable job queue on top of two Redis
//! lists, `waiting` and `working`.
//!
//! Producers push named jobs with a payload and an optional earliest
//! execution time. Workers move jobs atomically from waiting to working,
//! run the registered handler, and either remove the job or push it back.
//! A periodic reaper requeues jobs left in working by a crashed worker.

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod handler;
pub mod model;
pub mod store;
pub mod telemetry;

pub use engine::{Producer, Worker};
pub use error::{Error, Result};
pub use handler::HandlerRegistry;
pub use model::{JobEntry, Schedule};
