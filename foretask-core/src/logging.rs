//! File logging for the UI surfaces.
//!
//! All three binaries own the terminal, so nothing may ever log to stdout;
//! logs go to daily-rotated files under `$XDG_STATE_HOME/foretask/`.
//! `RUST_LOG` overrides the configured level.

use crate::config::{Config, LoggingConfig};
use crate::error::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "foretask.log";

/// Flushes pending writes when dropped; hold it for the process lifetime.
pub struct LoggingGuard {
    _worker: WorkerGuard,
}

/// Set up tracing with a daily-rotated file writer in the XDG state dir.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;
    prune_rotated_logs(&log_dir, config.max_files);

    let appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);
    let (writer, worker) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    tracing::info!(dir = %log_dir.display(), level = %config.level, "Logging to file");

    Ok(LoggingGuard { _worker: worker })
}

/// Delete the oldest rotated log files, keeping at most `max_files`.
///
/// Rotated files are named `foretask.log.YYYY-MM-DD`, so lexicographic order
/// is chronological order.
fn prune_rotated_logs(dir: &Path, max_files: usize) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    let mut logs: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(LOG_FILE_PREFIX))
                .unwrap_or(false)
        })
        .collect();

    if logs.len() <= max_files {
        return;
    }

    logs.sort();
    for stale in &logs[..logs.len() - max_files] {
        if let Err(e) = std::fs::remove_file(stale) {
            tracing::debug!(path = %stale.display(), error = %e, "Could not prune old log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prune_keeps_newest_files() {
        let dir = TempDir::new().unwrap();
        for day in ["2024-05-01", "2024-05-02", "2024-05-03", "2024-05-04"] {
            std::fs::write(dir.path().join(format!("{}.{}", LOG_FILE_PREFIX, day)), "").unwrap();
        }
        std::fs::write(dir.path().join("unrelated.txt"), "").unwrap();

        prune_rotated_logs(dir.path(), 2);

        let mut remaining: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        remaining.sort();
        assert_eq!(
            remaining,
            vec![
                "foretask.log.2024-05-03",
                "foretask.log.2024-05-04",
                "unrelated.txt"
            ]
        );
    }

    #[test]
    fn test_prune_under_limit_is_noop() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(format!("{}.2024-05-01", LOG_FILE_PREFIX)), "").unwrap();

        prune_rotated_logs(dir.path(), 5);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
