//! Sequential step runner for one operation.
//!
//! A run moves `Idle -> Running -> {Completed, Failed, TimedOut}`, or
//! straight to `Aborted` when the privilege gate refuses. Steps run one at a
//! time in declared order. A non-zero exit is recorded and the run goes on;
//! a timeout or execution error stops the remaining steps.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use globset::GlobSet;

use super::cleanup::{clean_roots, EntryRemover};
use super::operation::{Operation, OperationKind, Step, StepAction};
use super::report::{CleanupTally, RunReport, RunResult, RunState, StepOutcome, StepRecord};
use crate::error::MaintError;
use crate::log_sink::{ChannelId, Level, LogSink};
use crate::privilege::PrivilegeGate;
use crate::process::{ProcessOutput, ProcessRunner, ProgressTick, RunError};
use crate::ui_channel::{UiPayload, UiSender};

/// Collaborators shared by every run.
#[derive(Clone)]
pub struct RunContext {
    pub sink: Arc<LogSink>,
    pub runner: Arc<dyn ProcessRunner>,
    pub gate: Arc<dyn PrivilegeGate>,
    pub remover: Arc<dyn EntryRemover>,
    pub events: UiSender,
    /// How long the bar stays at 100 % before the UI resets it
    pub progress_reset_delay: Duration,
}

impl RunContext {
    /// Write to a channel. A failed write is surfaced on the panel and never
    /// stops the run.
    pub(crate) fn log(&self, target: OperationKind, channel: ChannelId, level: Level, message: &str) {
        if let Err(err) = self.sink.write(channel, level, message) {
            self.events
                .info(target, MaintError::LogWriteFailed(err).to_string());
        }
    }

    /// Log to `channel` and show the same text on the panel.
    pub(crate) fn announce(
        &self,
        target: OperationKind,
        channel: ChannelId,
        level: Level,
        message: String,
    ) {
        self.log(target, channel, level, &message);
        self.events.info(target, message);
    }
}

/// Converts per-step completion into the section's progress bar.
///
/// Intermediate values stay strictly below 1.0; the only 1.0 is sent by
/// [`ProgressTracker::finish`].
struct ProgressTracker<'a> {
    events: &'a UiSender,
    target: OperationKind,
    total: usize,
    last: f32,
}

impl<'a> ProgressTracker<'a> {
    fn new(events: &'a UiSender, target: OperationKind, total: usize) -> Self {
        Self {
            events,
            target,
            total,
            last: 0.0,
        }
    }

    /// Step `index` (1-based) has been attempted.
    fn step_done(&mut self, index: usize) {
        if index < self.total {
            self.set(index as f32 / self.total as f32);
        }
    }

    /// Synthetic tick inside step `index`.
    fn within_step(&mut self, index: usize, tick: ProgressTick) {
        let fraction = tick.step as f32 / (tick.total as f32 + 1.0);
        self.set(((index - 1) as f32 + fraction) / self.total as f32);
    }

    fn set(&mut self, value: f32) {
        if value > self.last && value < 1.0 {
            self.last = value;
            self.events.send(self.target, UiPayload::Progress(value));
        }
    }

    fn finish(self, reset_after: Duration) {
        self.events.send(self.target, UiPayload::Progress(1.0));
        self.events
            .send(self.target, UiPayload::ResetProgressAfter(reset_after));
    }
}

/// Run every step of `operation` and return its terminal report.
///
/// All outcomes are logged and sent to the UI channel; the final event of a
/// run is always [`UiPayload::Finished`].
pub fn run_operation(ctx: &RunContext, operation: &Operation) -> RunReport {
    let kind = operation.kind;
    let op_channel = kind.channel();
    let started_at = Local::now();

    ctx.events.send(kind, UiPayload::ClearPanel);

    if operation.requires_privilege && !ctx.gate.has_privilege() {
        let err = MaintError::PrivilegeDenied {
            operation: kind.display_name(),
        };
        let message = err.to_string();
        tracing::warn!(operation = kind.display_name(), "privilege gate refused run");
        let first_line = message.lines().next().unwrap_or_default();
        ctx.log(
            kind,
            ChannelId::Error,
            Level::Error,
            &format!("{}: {first_line}", kind.display_name()),
        );
        ctx.events.info(kind, message.clone());

        let report = RunReport {
            operation: kind,
            state: RunState::Aborted,
            result: RunResult::Error { message },
            steps: Vec::new(),
            started_at,
            finished_at: Local::now(),
        };
        ctx.events
            .send(kind, UiPayload::Finished(Box::new(report.clone())));
        return report;
    }

    let total = operation.steps.len();
    tracing::info!(operation = kind.display_name(), steps = total, "run started");
    ctx.announce(
        kind,
        op_channel,
        Level::Info,
        format!("Initializing {}...", kind.display_name()),
    );

    let mut tracker = ProgressTracker::new(&ctx.events, kind, total);
    let mut records = Vec::with_capacity(total);
    let mut halted: Option<(RunState, RunResult)> = None;

    for (offset, step) in operation.steps.iter().enumerate() {
        let index = offset + 1;
        ctx.announce(
            kind,
            op_channel,
            Level::Info,
            format!("Executing step {index}/{total}: {}", step.describe()),
        );
        ctx.events.send(
            kind,
            UiPayload::StepStarted {
                index,
                total,
                name: step.name.clone(),
            },
        );

        let clock = Instant::now();
        let outcome = execute_step(ctx, kind, &mut tracker, index, step);
        tracing::debug!(step = index, name = %step.name, outcome = ?outcome, "step finished");

        ctx.events.send(
            kind,
            UiPayload::StepFinished {
                index,
                total,
                name: step.name.clone(),
                outcome: outcome.clone(),
            },
        );
        records.push(StepRecord {
            index,
            name: step.name.clone(),
            channel: step.channel,
            outcome: outcome.clone(),
            duration_ms: clock.elapsed().as_millis() as u64,
        });

        match outcome {
            StepOutcome::TimedOut { .. } => {
                halted = Some((RunState::TimedOut, RunResult::Timeout { step: index }));
                break;
            }
            StepOutcome::Errored { message } => {
                halted = Some((RunState::Failed, RunResult::Error { message }));
                break;
            }
            _ => tracker.step_done(index),
        }
    }

    let (state, result) = halted.unwrap_or_else(|| (RunState::Completed, summarize(&records)));
    tracker.finish(ctx.progress_reset_delay);

    let report = RunReport {
        operation: kind,
        state,
        result,
        steps: records,
        started_at,
        finished_at: Local::now(),
    };

    let level = if state == RunState::Completed {
        Level::Info
    } else {
        Level::Error
    };
    ctx.announce(kind, op_channel, level, report.headline());
    tracing::info!(operation = kind.display_name(), state = state.as_str(), "run finished");

    ctx.events
        .send(kind, UiPayload::Finished(Box::new(report.clone())));
    report
}

fn summarize(records: &[StepRecord]) -> RunResult {
    let failed_steps: Vec<usize> = records
        .iter()
        .filter(|r| matches!(r.outcome, StepOutcome::Failed { .. }))
        .map(|r| r.index)
        .collect();

    let mut tally: Option<CleanupTally> = None;
    for record in records {
        if let StepOutcome::Cleaned(step_tally) = &record.outcome {
            tally.get_or_insert_with(CleanupTally::default).merge(step_tally);
        }
    }

    if records.iter().any(|r| r.outcome.is_partial()) {
        RunResult::PartialFailure {
            failed_steps,
            tally,
        }
    } else {
        RunResult::Success
    }
}

fn execute_step(
    ctx: &RunContext,
    kind: OperationKind,
    tracker: &mut ProgressTracker<'_>,
    index: usize,
    step: &Step,
) -> StepOutcome {
    let result = match &step.action {
        StepAction::Command { command, timeout } => ctx.runner.run(command, *timeout),
        StepAction::Tracked {
            command,
            label,
            estimated_steps,
            timeout,
        } => {
            let mut on_tick = |tick: ProgressTick| {
                ctx.announce(
                    kind,
                    step.channel,
                    Level::Info,
                    format!("{label}: Step {}/{}", tick.step, tick.total),
                );
                tracker.within_step(index, tick);
            };
            ctx.runner
                .run_with_progress(command, *estimated_steps, *timeout, &mut on_tick)
        }
        StepAction::Cleanup { roots, exclude } => {
            return run_cleanup(ctx, kind, step, roots, exclude);
        }
    };

    match result {
        Ok(output) => finish_command(ctx, kind, index, step, &output),
        Err(RunError::TimedOut(after)) => {
            let err = MaintError::StepTimedOut {
                step: index,
                name: step.name.clone(),
                timeout: after,
            };
            report_fatal(ctx, kind, step, &err);
            StepOutcome::TimedOut {
                after_secs: after.as_secs(),
            }
        }
        Err(source) => {
            let err = MaintError::UnhandledExecution {
                step: index,
                name: step.name.clone(),
                source,
            };
            report_fatal(ctx, kind, step, &err);
            StepOutcome::Errored {
                message: err.to_string(),
            }
        }
    }
}

fn finish_command(
    ctx: &RunContext,
    kind: OperationKind,
    index: usize,
    step: &Step,
    output: &ProcessOutput,
) -> StepOutcome {
    for line in output.lines() {
        ctx.log(kind, step.channel, Level::Info, line);
    }

    if output.success() {
        ctx.announce(
            kind,
            step.channel,
            Level::Info,
            format!("Step {index} ({}) completed successfully.", step.name),
        );
        StepOutcome::Succeeded
    } else {
        let err = MaintError::StepFailed {
            step: index,
            name: step.name.clone(),
            exit_code: output.exit_code,
        };
        ctx.announce(kind, step.channel, Level::Error, err.to_string());
        StepOutcome::Failed {
            exit_code: output.exit_code,
        }
    }
}

fn report_fatal(ctx: &RunContext, kind: OperationKind, step: &Step, err: &MaintError) {
    tracing::error!(step = %step.name, error = %err, "step stopped the run");
    let message = err.to_string();
    if step.channel != kind.channel() {
        ctx.log(kind, step.channel, Level::Error, &message);
    }
    ctx.announce(kind, kind.channel(), Level::Error, message);
}

fn run_cleanup(
    ctx: &RunContext,
    kind: OperationKind,
    step: &Step,
    roots: &[PathBuf],
    exclude: &GlobSet,
) -> StepOutcome {
    ctx.announce(
        kind,
        step.channel,
        Level::Info,
        format!("Starting {}...", kind.display_name()),
    );

    let mut on_entry = |level: Level, message: String| {
        if level >= Level::Warning {
            ctx.announce(kind, step.channel, level, message);
        } else {
            ctx.log(kind, step.channel, level, &message);
        }
    };
    let tally = clean_roots(roots, exclude, ctx.remover.as_ref(), &mut on_entry);

    ctx.announce(kind, step.channel, Level::Info, tally.summary());
    ctx.announce(kind, step.channel, Level::Info, tally.freed());
    StepOutcome::Cleaned(tally)
}
