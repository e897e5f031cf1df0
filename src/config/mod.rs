//! Typed configuration from environment variables or a TOML file.
//!
//! Loads once at startup, fails fast if required vars are missing.
//! The store URL may carry a password, so it is wrapped in
//! secrecy::SecretString to prevent log leaks.

pub mod secrets;

use crate::engine::retry::{Backoff, RetryPolicy};
use crate::error::{Error, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_KEY: &str = "jobby";
const DEFAULT_SERVICE_NAME: &str = "jobby";
const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(60 * 60);
const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct Config {
    pub redis_url: SecretString,
    pub worker: WorkerConfig,
    pub otel_endpoint: Option<String>,
    /// `service.name` for exported telemetry.
    pub service_name: String,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Use [`Config::load`] to pick up a local `.env` file first.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            redis_url: SecretString::from(required_var("JOBBY_REDIS_URL")?),
            worker: WorkerConfig::from_env()?,
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            service_name: std::env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| DEFAULT_SERVICE_NAME.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Read `.env` (if present) and then the process environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }
}

/// Engine settings for one worker instance.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Key namespace; lists are `{key}:waiting` and `{key}:working`.
    pub key: String,
    /// How often the reaper scans the working list.
    pub cleanup_interval: Duration,
    /// How long an entry may stay in working before it is requeued.
    pub job_timeout: Duration,
    /// Retry policy for store operations.
    pub retry: RetryPolicy,
    /// Cap on concurrently running handlers. `None` means unbounded.
    pub max_concurrent: Option<usize>,
    /// Buffer size of the event channel.
    pub event_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.to_string(),
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            job_timeout: DEFAULT_JOB_TIMEOUT,
            retry: RetryPolicy::default(),
            max_concurrent: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// TOML shape: everything lives under a `[queue]` table, durations in millis.
#[derive(Debug, Deserialize)]
struct FileConfig {
    queue: QueueSection,
}

#[derive(Debug, Default, Deserialize)]
struct QueueSection {
    key: Option<String>,
    cleanup_interval_ms: Option<u64>,
    job_timeout_ms: Option<u64>,
    max_concurrent: Option<usize>,
    retry_max_attempts: Option<u32>,
    retry_backoff_ms: Option<u64>,
    event_capacity: Option<usize>,
}

impl QueueSection {
    fn into_worker_config(self) -> Result<WorkerConfig> {
        let defaults = WorkerConfig::default();
        let max_concurrent = match self.max_concurrent {
            Some(0) => {
                return Err(Error::Config(
                    "max_concurrent must be greater than zero".to_string(),
                ));
            }
            other => other,
        };
        let backoff = match self.retry_backoff_ms {
            None | Some(0) => Backoff::None,
            Some(ms) => Backoff::exponential(Duration::from_millis(ms)),
        };
        Ok(WorkerConfig {
            key: self.key.unwrap_or(defaults.key),
            cleanup_interval: self
                .cleanup_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.cleanup_interval),
            job_timeout: self
                .job_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.job_timeout),
            retry: RetryPolicy {
                max_attempts: self.retry_max_attempts,
                backoff,
            },
            max_concurrent,
            event_capacity: self.event_capacity.unwrap_or(defaults.event_capacity),
        })
    }
}

impl WorkerConfig {
    /// Build from `JOBBY_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        QueueSection {
            key: std::env::var("JOBBY_KEY").ok(),
            cleanup_interval_ms: optional_var("JOBBY_CLEANUP_INTERVAL_MS")?,
            job_timeout_ms: optional_var("JOBBY_JOB_TIMEOUT_MS")?,
            max_concurrent: optional_var("JOBBY_MAX_CONCURRENT")?,
            retry_max_attempts: optional_var("JOBBY_RETRY_MAX_ATTEMPTS")?,
            retry_backoff_ms: optional_var("JOBBY_RETRY_BACKOFF_MS")?,
            event_capacity: optional_var("JOBBY_EVENT_CAPACITY")?,
        }
        .into_worker_config()
    }

    /// Parse a TOML document with a `[queue]` table.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("bad queue config: {e}")))?;
        file.queue.into_worker_config()
    }

    /// Read and parse a TOML config file.
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read queue config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

fn optional_var<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid value for {name}: {e}"))),
        Err(_) => Ok(None),
    }
}
