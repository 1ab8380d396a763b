//! Process diagnostics via `tracing`.
//!
//! Separate from the operation log channels: this is the developer-facing
//! trace of what the program itself did, written to a daily rolling file
//! under `<log dir>/diagnostics/`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingLevel;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_PREFIX: &str = "maintkit.log";
const KEEP_DAYS: u64 = 7;

/// Where diagnostics go besides the rolling file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Console {
    /// Nothing on the terminal; the TUI owns it.
    Silent,
    /// Warnings and errors on stderr.
    Stderr,
}

pub fn diagnostics_dir(log_dir: &Path) -> PathBuf {
    log_dir.join("diagnostics")
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(log_dir: &Path, level: LoggingLevel, console: Console) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new("warn");
        if let Ok(directive) = format!("maintkit={}", level.as_directive()).parse() {
            filter = filter.add_directive(directive);
        }
        filter
    });

    let stderr_layer = (console == Console::Stderr).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .with_filter(LevelFilter::WARN)
    });

    let dir = diagnostics_dir(log_dir);
    let file_layer = match file_writer(&dir) {
        Ok((writer, guard)) => {
            // Keep the background writer alive for the rest of the process.
            let _ = LOG_GUARD.set(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_ansi(false),
            )
        }
        Err(e) => {
            if console == Console::Stderr {
                eprintln!("maintkit: failed to initialize diagnostics file: {e:#}");
            }
            None
        }
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
}

fn file_writer(
    dir: &Path,
) -> anyhow::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    fs::create_dir_all(dir).map_err(|e| {
        anyhow::anyhow!("create log directory failed: {} ({})", dir.display(), e)
    })?;

    cleanup_old_logs(dir);

    let appender = tracing_appender::rolling::daily(dir, LOG_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}

fn cleanup_old_logs(dir: &Path) {
    let Some(cutoff) =
        SystemTime::now().checked_sub(Duration::from_secs(KEEP_DAYS * 24 * 60 * 60))
    else {
        return;
    };

    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }

        // Only touch files created by the rolling appender.
        if !entry.file_name().to_string_lossy().starts_with(LOG_PREFIX) {
            continue;
        }

        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        if modified < cutoff {
            let _ = fs::remove_file(entry.path());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_keeps_recent_and_foreign_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ours = temp_dir.path().join("maintkit.log.2026-10-01");
        let foreign = temp_dir.path().join("other.log");
        fs::write(&ours, "x").unwrap();
        fs::write(&foreign, "x").unwrap();

        cleanup_old_logs(temp_dir.path());

        assert!(ours.exists());
        assert!(foreign.exists());
    }

    #[test]
    fn test_diagnostics_live_under_log_dir() {
        assert_eq!(
            diagnostics_dir(Path::new("logs")),
            Path::new("logs").join("diagnostics")
        );
    }
}
