//! Per-operation log channels.
//!
//! Every channel is one UTF-8 file under the log directory. Handles are
//! opened lazily on first write and kept open; each channel owns its own
//! handle behind its own lock, so writers on different channels never
//! contend and a channel's file is only ever touched through its slot.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Timestamp layout of every log line (`2024-05-01 13:37:00,123`).
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Every log channel the toolkit writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ChannelId {
    SystemHealthCheck,
    DiskCleanup,
    Defragment,
    CheckHealth,
    ScanHealth,
    RestoreHealth,
    SfcScannow,
    AnalyzeComponentStore,
    StartComponentCleanup,
    /// Fallback channel for privilege probes and failed log writes.
    Error,
}

impl ChannelId {
    pub const ALL: [ChannelId; 10] = [
        ChannelId::SystemHealthCheck,
        ChannelId::DiskCleanup,
        ChannelId::Defragment,
        ChannelId::CheckHealth,
        ChannelId::ScanHealth,
        ChannelId::RestoreHealth,
        ChannelId::SfcScannow,
        ChannelId::AnalyzeComponentStore,
        ChannelId::StartComponentCleanup,
        ChannelId::Error,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            ChannelId::SystemHealthCheck => "system_health_check.log",
            ChannelId::DiskCleanup => "disk_cleanup.log",
            ChannelId::Defragment => "defragment.log",
            ChannelId::CheckHealth => "checkhealth.log",
            ChannelId::ScanHealth => "scanhealth.log",
            ChannelId::RestoreHealth => "Restorehealth.log",
            ChannelId::SfcScannow => "sfc_scannow.log",
            ChannelId::AnalyzeComponentStore => "AnalyzeComponentStore.log",
            ChannelId::StartComponentCleanup => "StartComponentCleanup.log",
            ChannelId::Error => "error.log",
        }
    }

    /// Short label used for log viewer tabs.
    pub fn label(self) -> &'static str {
        match self {
            ChannelId::SystemHealthCheck => "Summary",
            ChannelId::DiskCleanup => "Disk cleanup",
            ChannelId::Defragment => "Defragment",
            ChannelId::CheckHealth => "Checkhealth",
            ChannelId::ScanHealth => "Scanhealth",
            ChannelId::RestoreHealth => "Restorehealth",
            ChannelId::SfcScannow => "Sfc scannow",
            ChannelId::AnalyzeComponentStore => "Analyzecomponentstore",
            ChannelId::StartComponentCleanup => "Startcomponentcleanup",
            ChannelId::Error => "Errors",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("cannot open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot clear {}: {source}", .path.display())]
    Clear {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Append-only channel registry shared by every run.
#[derive(Debug)]
pub struct LogSink {
    dir: PathBuf,
    channels: BTreeMap<ChannelId, Mutex<Option<File>>>,
}

impl LogSink {
    /// Create a sink rooted at `dir`. Nothing is opened until the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let channels = ChannelId::ALL
            .iter()
            .map(|&id| (id, Mutex::new(None)))
            .collect();
        Self {
            dir: dir.into(),
            channels,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, channel: ChannelId) -> PathBuf {
        self.dir.join(channel.file_name())
    }

    /// Append one timestamped line to `channel`.
    ///
    /// A failure is returned to the caller and also recorded on the
    /// [`ChannelId::Error`] channel, so it is never lost silently.
    pub fn write(&self, channel: ChannelId, level: Level, message: &str) -> Result<(), LogError> {
        let result = self.append(channel, level, message);
        if let Err(err) = &result {
            tracing::warn!(channel = ?channel, error = %err, "log write failed");
            if channel != ChannelId::Error {
                let fallback = format!("Failed to write to {}: {err}", channel.file_name());
                if let Err(fallback_err) = self.append(ChannelId::Error, Level::Error, &fallback) {
                    tracing::error!(error = %fallback_err, "fallback error channel is unavailable");
                }
            }
        }
        result
    }

    pub fn info(&self, channel: ChannelId, message: &str) -> Result<(), LogError> {
        self.write(channel, Level::Info, message)
    }

    pub fn warning(&self, channel: ChannelId, message: &str) -> Result<(), LogError> {
        self.write(channel, Level::Warning, message)
    }

    pub fn error(&self, channel: ChannelId, message: &str) -> Result<(), LogError> {
        self.write(channel, Level::Error, message)
    }

    /// Close the channel's handle and truncate its file.
    ///
    /// The next write reopens the file, so the channel is immediately usable.
    pub fn clear(&self, channel: ChannelId) -> Result<(), LogError> {
        let path = self.path(channel);
        let mut slot = self.slot(channel);
        // Release the handle before truncating.
        drop(slot.take());

        match File::create(&path) {
            Ok(_) => {
                tracing::info!(file = %path.display(), "cleared log channel");
                Ok(())
            }
            Err(source) if source.kind() == io::ErrorKind::NotFound && !self.dir.exists() => {
                // No log directory yet means nothing was ever written.
                Ok(())
            }
            Err(source) => Err(LogError::Clear { path, source }),
        }
    }

    /// Clear every known channel. All channels are attempted even if some fail.
    pub fn clear_all(&self) -> Result<(), Vec<LogError>> {
        let errors: Vec<LogError> = ChannelId::ALL
            .iter()
            .filter_map(|&channel| self.clear(channel).err())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            for err in &errors {
                tracing::error!(error = %err, "failed to clear log channel");
            }
            Err(errors)
        }
    }

    /// Current content of a channel, or `None` if it was never written.
    pub fn read(&self, channel: ChannelId) -> Result<Option<String>, LogError> {
        let path = self.path(channel);
        // Hold the slot so a concurrent write can't interleave with the read.
        let _slot = self.slot(channel);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(LogError::Read { path, source }),
        }
    }

    fn append(&self, channel: ChannelId, level: Level, message: &str) -> Result<(), LogError> {
        let path = self.path(channel);
        let mut slot = self.slot(channel);

        if slot.is_none() {
            *slot = Some(self.open(&path)?);
        }

        let line = format!(
            "{} - {} - {}\n",
            Local::now().format(TIMESTAMP_FORMAT),
            level.as_str(),
            message
        );

        let written = match slot.as_mut() {
            Some(file) => file.write_all(line.as_bytes()).and_then(|()| file.flush()),
            None => Ok(()),
        };

        written.map_err(|source| {
            // Drop the broken handle; the next write reopens.
            *slot = None;
            LogError::Write { path, source }
        })
    }

    fn open(&self, path: &Path) -> Result<File, LogError> {
        fs::create_dir_all(&self.dir).map_err(|source| LogError::Open {
            path: self.dir.clone(),
            source,
        })?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| LogError::Open {
                path: path.to_path_buf(),
                source,
            })
    }

    fn slot(&self, channel: ChannelId) -> MutexGuard<'_, Option<File>> {
        // Every ChannelId is registered in `new`.
        self.channels[&channel]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
