//! File + console tracing setup and log retention.
//!
//! Daily rotated files under the configured log dir, pruned at startup.
//! The returned guard must be held for the lifetime of the process so the
//! non-blocking writer flushes on exit.

use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use doorwatch_config::LogSection;

use crate::error::AppError;

const LOG_FILE_PREFIX: &str = "doorwatch.log";

pub fn init_tracing(verbosity: u8, log: &LogSection) -> Result<WorkerGuard, AppError> {
    let console_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    std::fs::create_dir_all(&log.dir).map_err(|source| AppError::Logging {
        dir: log.dir.display().to_string(),
        source,
    })?;
    prune_old_logs(&log.dir, log.retention_days);

    let file_appender = tracing_appender::rolling::daily(&log.dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_filter(EnvFilter::new("debug")),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new(console_level)),
                ),
        )
        .init();

    Ok(guard)
}

/// Delete rotated log files past the retention window. Failures are
/// logged and skipped; retention never blocks startup.
fn prune_old_logs(dir: &Path, retention_days: u32) {
    if retention_days == 0 {
        return;
    }
    let cutoff = SystemTime::now() - Duration::from_secs(u64::from(retention_days) * 86_400);

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(?err, dir = %dir.display(), "cannot scan log dir for retention");
            return;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(LOG_FILE_PREFIX) {
            continue;
        }
        let modified = entry.metadata().and_then(|meta| meta.modified());
        if let Ok(modified) = modified {
            if modified < cutoff && std::fs::remove_file(entry.path()).is_err() {
                warn!(file = %entry.path().display(), "failed to prune old log file");
            }
        }
    }
}
