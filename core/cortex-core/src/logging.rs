//! Tracing setup for binaries built on cortex-core.
//!
//! Output goes to stderr and, when a log directory is given, to `daemon.log` inside it.
//! `RUST_LOG` overrides the configured level.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_NAME: &str = "daemon.log";

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Keep the returned guard alive until exit or
/// buffered file output is lost. Calling this twice leaves the first subscriber in place.
pub fn init(level: &str, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = env_filter(level);

    let Some(dir) = log_dir else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
        return None;
    };

    if let Err(err) = fs_err::create_dir_all(dir) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
        tracing::warn!(error = %err, "Log directory unavailable, logging to stderr only");
        return None;
    }

    let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::io::stderr.and(file_writer))
        .try_init();

    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_creates_log_file_and_is_repeatable() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("logs");

        let guard = init("debug", Some(&dir));
        tracing::info!("logging initialized");
        assert!(guard.is_some());
        assert!(dir.join(LOG_FILE_NAME).exists());

        assert!(init("info", None).is_none());
    }

    #[test]
    fn invalid_level_falls_back() {
        let filter = env_filter("not a [valid directive");
        // Either RUST_LOG or the fallback; construction must not panic.
        let _ = filter.to_string();
    }
}
