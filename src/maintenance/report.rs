//! Run results.

use bytesize::ByteSize;
use chrono::{DateTime, Local};
use serde::Serialize;

use super::operation::OperationKind;
use crate::log_sink::ChannelId;

/// Per-entry counts of a filesystem cleanup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupTally {
    pub deleted: u64,
    pub in_use: u64,
    pub permission_denied: u64,
    /// Entries that failed for any other reason
    pub errors: u64,
    pub bytes_freed: u64,
}

impl CleanupTally {
    pub fn summary(&self) -> String {
        format!(
            "Deleted: {}, In Use: {}, Permission Denied: {}",
            self.deleted, self.in_use, self.permission_denied
        )
    }

    pub fn freed(&self) -> String {
        format!("Freed: {}", ByteSize(self.bytes_freed))
    }

    pub fn has_skips(&self) -> bool {
        self.in_use + self.permission_denied + self.errors > 0
    }

    pub fn merge(&mut self, other: &CleanupTally) {
        self.deleted += other.deleted;
        self.in_use += other.in_use;
        self.permission_denied += other.permission_denied;
        self.errors += other.errors;
        self.bytes_freed += other.bytes_freed;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed { exit_code: i32 },
    Cleaned(CleanupTally),
    TimedOut { after_secs: u64 },
    Errored { message: String },
}

impl StepOutcome {
    /// Whether the step fell short without stopping the run
    pub fn is_partial(&self) -> bool {
        match self {
            StepOutcome::Failed { .. } => true,
            StepOutcome::Cleaned(tally) => tally.has_skips(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
    TimedOut,
    /// Refused by the privilege gate before any step ran
    Aborted,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::TimedOut => "timed out",
            RunState::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunResult {
    Success,
    PartialFailure {
        /// 1-based indices of the steps that fell short
        failed_steps: Vec<usize>,
        tally: Option<CleanupTally>,
    },
    Timeout { step: usize },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub name: String,
    pub channel: ChannelId,
    pub outcome: StepOutcome,
    pub duration_ms: u64,
}

/// Terminal record of one operation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub operation: OperationKind,
    pub state: RunState,
    pub result: RunResult,
    pub steps: Vec<StepRecord>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl RunReport {
    pub fn tally(&self) -> Option<CleanupTally> {
        let mut total: Option<CleanupTally> = None;
        for step in &self.steps {
            if let StepOutcome::Cleaned(tally) = &step.outcome {
                total.get_or_insert_with(CleanupTally::default).merge(tally);
            }
        }
        total
    }

    /// One-line description of how the run ended.
    pub fn headline(&self) -> String {
        let name = self.operation.display_name();
        match (&self.state, &self.result) {
            (RunState::Completed, RunResult::Success) => format!("{name} completed."),
            (RunState::Completed, RunResult::PartialFailure { failed_steps, .. })
                if !failed_steps.is_empty() =>
            {
                format!("{name} completed with {} failed step(s).", failed_steps.len())
            }
            (RunState::Completed, _) => format!("{name} completed with skipped entries."),
            (RunState::TimedOut, RunResult::Timeout { step }) => {
                format!("{name} stopped: step {step} timed out.")
            }
            (RunState::Aborted, _) => format!("{name} was not started."),
            (_, RunResult::Error { message }) => format!("{name} failed: {message}"),
            (state, _) => format!("{name} {}.", state.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(state: RunState, result: RunResult, steps: Vec<StepRecord>) -> RunReport {
        RunReport {
            operation: OperationKind::DiskCleanup,
            state,
            result,
            steps,
            started_at: Local::now(),
            finished_at: Local::now(),
        }
    }

    #[test]
    fn test_tally_summary_wording() {
        let tally = CleanupTally {
            deleted: 3,
            in_use: 1,
            permission_denied: 1,
            errors: 0,
            bytes_freed: 2048,
        };
        assert_eq!(tally.summary(), "Deleted: 3, In Use: 1, Permission Denied: 1");
        assert!(tally.freed().starts_with("Freed: 2.0 K"));
        assert!(tally.has_skips());
    }

    #[test]
    fn test_report_tally_merges_cleanup_steps() {
        let step = |deleted| StepRecord {
            index: 1,
            name: "cleanup".to_string(),
            channel: ChannelId::DiskCleanup,
            outcome: StepOutcome::Cleaned(CleanupTally {
                deleted,
                ..Default::default()
            }),
            duration_ms: 0,
        };
        let report = report(RunState::Completed, RunResult::Success, vec![step(2), step(5)]);
        assert_eq!(report.tally().map(|t| t.deleted), Some(7));
    }

    #[test]
    fn test_headlines() {
        let ok = report(RunState::Completed, RunResult::Success, Vec::new());
        assert_eq!(ok.headline(), "Disk Cleanup completed.");

        let timed_out = report(RunState::TimedOut, RunResult::Timeout { step: 2 }, Vec::new());
        assert_eq!(timed_out.headline(), "Disk Cleanup stopped: step 2 timed out.");
    }

    #[test]
    fn test_outcome_classification() {
        assert!(StepOutcome::Failed { exit_code: 1 }.is_partial());
        assert!(!StepOutcome::TimedOut { after_secs: 1 }.is_partial());
        assert!(!StepOutcome::Cleaned(CleanupTally::default()).is_partial());
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = report(
            RunState::Completed,
            RunResult::PartialFailure {
                failed_steps: vec![4],
                tally: None,
            },
            Vec::new(),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "completed");
        assert_eq!(json["result"]["kind"], "partial_failure");
        assert_eq!(json["result"]["failed_steps"][0], 4);
    }
}
