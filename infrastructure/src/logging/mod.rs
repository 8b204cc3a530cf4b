//! Logging infrastructure: tracing subscriber setup and the session event log.
//!
//! - [`init_tracing`] installs the global `tracing` subscriber
//! - [`JsonlSessionRecorder`] implements the
//!   [`SessionRecorder`](relay_application::SessionRecorder) port

mod jsonl_recorder;

pub use jsonl_recorder::JsonlSessionRecorder;

use crate::config::FileLoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Map a verbosity count to a level filter.
pub fn verbosity_filter(verbosity: u8) -> EnvFilter {
    match verbosity {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Install the global tracing subscriber.
///
/// Always logs to stderr. With a configured directory, also writes a
/// daily-rolling file; keep the returned guard alive for the life of the
/// process or buffered lines are lost. Does nothing if a subscriber is
/// already installed.
pub fn init_tracing(config: &FileLoggingConfig) -> Option<WorkerGuard> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry()
        .with(verbosity_filter(config.verbosity))
        .with(stderr_layer);

    match &config.directory {
        Some(dir) => {
            let appender =
                tracing_appender::rolling::daily(dir, FileLoggingConfig::TRACE_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            let _ = registry.with(file_layer).try_init();
            Some(guard)
        }
        None => {
            let _ = registry.try_init();
            None
        }
    }
}
