//! Error taxonomy for maintenance runs.
//!
//! The `Display` text of each variant is what ends up in log channels and
//! on-screen panels, so the wording here is user facing.

use std::path::PathBuf;
use std::time::Duration;

use crate::log_sink::LogError;
use crate::process::RunError;

#[derive(Debug, thiserror::Error)]
pub enum MaintError {
    #[error(
        "Admin privileges are required to perform this operation.\n\
         Please restart the program as an administrator."
    )]
    PrivilegeDenied { operation: &'static str },

    #[error("Step {step} ({name}) failed with exit code {exit_code}.")]
    StepFailed {
        step: usize,
        name: String,
        exit_code: i32,
    },

    #[error("Step {step} ({name}) timed out after {}s.", .timeout.as_secs())]
    StepTimedOut {
        step: usize,
        name: String,
        timeout: Duration,
    },

    #[error("Permission denied for {}", .path.display())]
    FilesystemAccessDenied { path: PathBuf },

    #[error("In use by another program: {}", .path.display())]
    FilesystemInUse { path: PathBuf },

    #[error("Log write failed: {0}")]
    LogWriteFailed(#[from] LogError),

    #[error("Error executing step {step} ({name}): {source}")]
    UnhandledExecution {
        step: usize,
        name: String,
        #[source]
        source: RunError,
    },

    #[error("Unexpected failure while running {operation}: {detail}")]
    WorkerPanicked {
        operation: &'static str,
        detail: String,
    },

    #[error("Could not start a worker for {operation}: {source}")]
    WorkerSpawn {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} is already running")]
    AlreadyRunning { operation: &'static str },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, MaintError>;
