use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::Config;

const MAX_LOG_FILES: usize = 14;

/// Flushes the non-blocking file writers when dropped; hold it until exit.
#[must_use = "log files stop being written once the guards are dropped"]
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

fn rolling_appender(dir: &Path, prefix: &str) -> Result<RollingFileAppender> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .with_context(|| format!("Failed to open {} in {}", prefix, dir.display()))
}

/// Install the global subscriber: console, `app.log` and an errors-only
/// `error.log`, all behind `RUST_LOG` (default `info`).
pub fn init(config: &Config) -> Result<LogGuards> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid RUST_LOG filter")?;

    let (app_writer, app_guard) =
        tracing_appender::non_blocking(rolling_appender(&config.log_dir, "app.log")?);
    let (error_writer, error_guard) =
        tracing_appender::non_blocking(rolling_appender(&config.log_dir, "error.log")?);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layer().compact())
        .with(layer().with_writer(app_writer).with_ansi(false))
        .with(
            layer()
                .with_writer(error_writer)
                .with_ansi(false)
                .with_filter(LevelFilter::ERROR),
        )
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(LogGuards {
        _guards: vec![app_guard, error_guard],
    })
}
