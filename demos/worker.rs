//! Minimal worker: registers a `send-email` handler, pushes one job now and
//! one in five seconds, and runs until Ctrl-C.
//!
//! Needs `JOBBY_REDIS_URL` (or a `.env` file), e.g. `redis://127.0.0.1:6379/0`.

use jobby::config::Config;
use jobby::event::EventKind;
use jobby::telemetry::{TelemetryConfig, init_telemetry};
use jobby::{HandlerRegistry, Schedule, Worker};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    let _guard = init_telemetry(TelemetryConfig::from_config(&config))?;

    let registry = HandlerRegistry::empty().with("send-email", |payload| async move {
        let to = payload
            .get("to")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("payload has no recipient"))?;
        tracing::info!(to, "sending email");
        Ok::<(), anyhow::Error>(())
    });

    let worker = Worker::connect(&config.redis_url, registry, config.worker.clone()).await?;
    let mut events = worker.start()?;

    worker
        .push("send-email", serde_json::json!({"to": "a@b.com"}), Schedule::Now)
        .await?;
    worker
        .push(
            "send-email",
            serde_json::json!({"to": "later@b.com"}),
            Duration::from_secs(5),
        )
        .await?;

    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let EventKind::StoreError { operation, error } = &event.kind {
                tracing::warn!(%operation, error, "store trouble");
            }
        }
    });

    tokio::signal::ctrl_c().await.ok();
    worker.disconnect().await;
    Ok(())
}
