//! Maintenance operations
//!
//! Each operation is an ordered list of steps run on a worker thread:
//! - System health check (DISM and sfc scans, one log channel per command)
//! - Disk cleanup (bottom-up removal of temp directories)
//! - Defragment and optimize drives (one `defrag` per drive)

mod catalog;
mod cleanup;
mod launcher;
mod operation;
mod pipeline;
mod report;

pub use catalog::Catalog;
pub use cleanup::{in_use_error, EntryRemover, FsRemover};
pub use launcher::Launcher;
pub use operation::{Operation, OperationKind, Step, StepAction};
pub use pipeline::{run_operation, RunContext};
pub use report::{CleanupTally, RunReport, RunResult, RunState, StepOutcome, StepRecord};
