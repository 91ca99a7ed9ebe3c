//! Logging infrastructure for flowstats
//!
//! Logs are written to `~/.local/state/flowstats/flowstats.log` following XDG standards.
//! Report runs are wrapped in a [`site_span`] so every line names the site
//! tables and database it was computed from.

use crate::config::{Config, LoggingConfig};
use crate::types::TablePrefix;
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize the logging system
///
/// Sets up tracing with:
/// - File output to XDG state directory
/// - Daily log rotation
/// - Configurable log level via config or RUST_LOG env var
pub fn init(config: &LoggingConfig) -> crate::error::Result<LoggingGuard> {
    let (log_dir, file_name) = log_file_parts(&Config::log_path());

    // Create log directory if it doesn't exist
    std::fs::create_dir_all(&log_dir)?;

    // Daily files: flowstats.log.YYYY-MM-DD
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, &file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins over the configured level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    // Aggregations run inside spans; closing them records the query time
    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        version = env!("CARGO_PKG_VERSION"),
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Initialize logging for tests (logs to stdout)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Span carrying the site being reported on.
///
/// Enter it around a report run; the aggregation spans nest inside it.
pub fn site_span(prefix: &TablePrefix, db_path: &Path) -> tracing::Span {
    tracing::info_span!(
        "site",
        prefix = prefix.site(),
        users = prefix.base(),
        db = %db_path.display()
    )
}

/// Guard that keeps the logging system alive
///
/// When dropped, flushes any pending log writes.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Returns the log file path
pub fn log_file_path() -> PathBuf {
    Config::log_path()
}

/// Split a log path into the appender's directory and file name prefix.
fn log_file_parts(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::state_dir);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "flowstats.log".to_string());
    (dir, file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path() {
        let path = log_file_path();
        assert!(path.ends_with("flowstats.log"));
    }

    #[test]
    fn test_log_file_parts() {
        let (dir, name) = log_file_parts(Path::new("/var/state/flowstats/flowstats.log"));
        assert_eq!(dir, PathBuf::from("/var/state/flowstats"));
        assert_eq!(name, "flowstats.log");
    }

    #[test]
    fn test_site_span_for_child_site() {
        init_test();
        let prefix = TablePrefix::for_site("wp_", 4).unwrap();
        let span = site_span(&prefix, Path::new("/tmp/site.db"));
        let _enter = span.enter();
        tracing::info!("inside site span");
    }
}
