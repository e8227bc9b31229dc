//! Logging setup: console plus daily-rotated files with local timestamps.
//!
//! Each service writes to its own file family (`record.log.YYYY-MM-DD`,
//! `postprocess.log.YYYY-MM-DD`, ...) inside the log directory. Files older
//! than the retention period are removed by a background task.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::LoggingSection;
use crate::utils::fs;

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "stream_archiver=info,process_utils=info";

const CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Timer that formats timestamps in the local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Handle to the installed logging setup.
#[derive(Debug, Clone)]
pub struct LoggingHandle {
    log_dir: PathBuf,
    file_prefix: String,
    retention_days: i64,
}

impl LoggingHandle {
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// File name prefix of this service's log files.
    pub fn file_prefix(&self) -> &str {
        &self.file_prefix
    }

    /// Remove expired logs now and then once a day until cancelled.
    pub fn start_retention_cleanup(&self, cancel_token: CancellationToken) {
        let handle = self.clone();

        tokio::spawn(async move {
            loop {
                if let Err(e) =
                    cleanup_old_logs(&handle.log_dir, &handle.file_prefix, handle.retention_days)
                        .await
                {
                    warn!(error = %e, "Failed to cleanup old logs");
                }

                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Log retention cleanup task shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(CLEANUP_INTERVAL) => {}
                }
            }
        });
    }
}

/// Pick the filter: `RUST_LOG` wins, then the configured directive, then the default.
fn resolve_filter(configured: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        configured
            .and_then(|directive| match EnvFilter::try_new(directive) {
                Ok(filter) => Some(filter),
                Err(e) => {
                    eprintln!("Invalid log filter '{}', using default: {}", directive, e);
                    None
                }
            })
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
    })
}

/// Initialize logging for `service`.
///
/// Keep the returned guard alive for the lifetime of the process; dropping it
/// flushes and closes the file writer.
pub fn init_logging(
    settings: &LoggingSection,
    service: &str,
) -> crate::Result<(LoggingHandle, WorkerGuard)> {
    fs::ensure_dir_all_sync_with_op("creating log directory", &settings.dir)?;

    let file_prefix = format!("{service}.log");
    let file_appender = tracing_appender::rolling::daily(&settings.dir, &file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(resolve_filter(settings.filter.as_deref()))
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer),
        )
        .try_init()
        .map_err(|e| {
            crate::Error::Other(format!("Failed to set global default subscriber: {}", e))
        })?;

    let handle = LoggingHandle {
        log_dir: settings.dir.clone(),
        file_prefix,
        retention_days: settings.retention_days,
    };
    Ok((handle, guard))
}

/// Delete `{prefix}.YYYY-MM-DD` files older than `retention_days`.
///
/// Returns the number of files deleted.
async fn cleanup_old_logs(log_dir: &Path, prefix: &str, retention_days: i64) -> std::io::Result<usize> {
    let cutoff = Local::now().date_naive() - chrono::Duration::days(retention_days);
    let dated_prefix = format!("{prefix}.");

    let mut entries = tokio::fs::read_dir(log_dir).await?;
    let mut deleted_count = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(date_str) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(&dated_prefix))
        else {
            continue;
        };

        let Ok(file_date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else {
            continue;
        };

        if file_date < cutoff {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to delete old log file");
            } else {
                deleted_count += 1;
                debug!(path = %path.display(), "Deleted old log file");
            }
        }
    }

    if deleted_count > 0 {
        info!(count = deleted_count, "Cleaned up old log files");
    }

    Ok(deleted_count)
}
