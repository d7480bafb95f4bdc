//! Logging setup for phase units and trigger daemons.
//!
//! Phase units log to stdout and to `agents/<adw-id>/<trigger>/execution.log`;
//! the returned guard must be held for the life of the process so buffered
//! file output is flushed on exit.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, ensure_dir};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize per-workflow logging: console plus execution.log.
pub fn init(config: &Config, adw_id: &str, trigger: &str) -> Result<WorkerGuard> {
    let log_dir = config.trigger_log_dir(adw_id, trigger);
    ensure_dir(&log_dir)?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("execution.log"))
        .with_context(|| format!("Failed to open execution log in {}", log_dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(false).without_time())
        .with(fmt::layer().with_target(false).with_ansi(false).with_writer(writer))
        .init();

    tracing::info!("ADW logger initialized - ID: {adw_id}");
    Ok(guard)
}

/// Console-only logging for the trigger daemons, which run before any
/// workflow id exists.
pub fn init_console() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(false))
        .init();
}
