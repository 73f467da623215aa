//! Tracing setup: compact human output in debug builds, flattened JSON in
//! release, optionally duplicated to a rotating file when `--log-dir` is
//! given. A global panic hook logs the panic location and payload through
//! `tracing` rather than letting it go straight to stderr unstructured.

use std::panic;
use std::path::Path;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Keeps the non-blocking file writer's worker thread alive for the
/// process lifetime. Dropping it would silently stop the file sink.
pub struct LoggingGuard {
    _file_appender_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

pub fn init_tracing(level: &str, log_dir: Option<&Path>) -> LoggingGuard {
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("faceaccessd={level},faceaccess_pipeline={level}").into())
    };

    let is_release = !cfg!(debug_assertions);
    let file_sink = log_dir.map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, "faceaccessd.log");
        tracing_appender::non_blocking(appender)
    });

    let guard = match (is_release, file_sink) {
        (true, Some((writer, guard))) => {
            tracing_subscriber::registry()
                .with(filter())
                .with(fmt::layer().json().flatten_event(true))
                .with(fmt::layer().json().flatten_event(true).with_writer(writer))
                .init();
            Some(guard)
        }
        (true, None) => {
            tracing_subscriber::registry()
                .with(filter())
                .with(fmt::layer().json().flatten_event(true))
                .init();
            None
        }
        (false, Some((writer, guard))) => {
            tracing_subscriber::registry()
                .with(filter())
                .with(fmt::layer().compact().with_target(false))
                .with(fmt::layer().json().flatten_event(true).with_writer(writer))
                .init();
            Some(guard)
        }
        (false, None) => {
            tracing_subscriber::registry()
                .with(filter())
                .with(fmt::layer().compact().with_target(false))
                .init();
            None
        }
    };

    panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<non-string panic payload>");
        tracing::error!(location = %location, payload, "panic");
    }));

    tracing::info!(%level, "tracing initialized");
    LoggingGuard {
        _file_appender_guard: guard,
    }
}
