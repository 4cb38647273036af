//! Tracing setup: stderr plus a daily-rotating log file.

use std::sync::Mutex;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

static LOG_GUARD: Mutex<Option<WorkerGuard>> = Mutex::new(None);

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
///
/// Calling this more than once keeps the first subscriber.
pub fn init(config: &LoggingConfig) {
    let _ = std::fs::create_dir_all(&config.dir);

    let file_appender = tracing_appender::rolling::daily(&config.dir, &config.file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    if let Ok(mut slot) = LOG_GUARD.lock() {
        if slot.is_none() {
            *slot = Some(guard);
        }
    }

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(non_blocking);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
}

/// Flush the file writer. Call once, right before the process exits.
pub fn shutdown() {
    if let Ok(mut slot) = LOG_GUARD.lock() {
        slot.take();
    }
}
