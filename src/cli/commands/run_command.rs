//! Run command feature.
//!
//! This module owns and handles the "maintkit run" command behavior: the
//! same launcher and update channel the dashboard uses, drained by the main
//! thread on the UI tick and rendered as a progress bar.

use std::time::Duration;

use anyhow::anyhow;

use crate::cli::{bootstrap, Runtime};
use crate::config::Config;
use crate::maintenance::{OperationKind, RunReport, RunState};
use crate::progress;
use crate::theme::Theme;
use crate::ui_channel::{UiEvent, UiPayload, UiReceiver};

pub(crate) fn handle_run(config: &Config, kind: OperationKind, json: bool) -> anyhow::Result<()> {
    let Runtime {
        launcher,
        mut receiver,
    } = bootstrap(config)?;
    let worker = launcher.launch(kind)?;

    let bar = if json {
        None
    } else {
        println!();
        println!("{}", Theme::header(kind.display_name()));
        println!("{}", Theme::divider_bold(60));
        Some(progress::create_run_bar("starting"))
    };

    let finished = follow(&mut receiver, kind, config.tick(), || worker.is_finished(), |payload| {
        let Some(bar) = &bar else { return };
        match payload {
            UiPayload::Info(message) => bar.println(message),
            UiPayload::Progress(value) => progress::set_fraction(bar, *value),
            UiPayload::StepStarted { index, total, name } => {
                bar.set_message(format!("{name} ({index}/{total})"))
            }
            _ => {}
        }
    });

    let joined = worker.join().map_err(|_| anyhow!("worker thread panicked"));
    let report = match finished {
        Some(report) => report,
        None => joined?,
    };

    if let Some(bar) = &bar {
        progress::finish_with_message(bar, report.state.as_str());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report, &launcher.context().sink.dir().display().to_string());
    }

    if report.state != RunState::Completed {
        return Err(anyhow!("{}", report.headline()));
    }
    Ok(())
}

/// Drain `receiver` on every tick until `kind` reports `Finished`.
///
/// Returns `None` if the worker ended without a report.
fn follow(
    receiver: &mut UiReceiver,
    kind: OperationKind,
    tick: Duration,
    worker_done: impl Fn() -> bool,
    mut on_event: impl FnMut(&UiPayload),
) -> Option<RunReport> {
    loop {
        let mut done: Option<RunReport> = None;
        let mut apply = |event: UiEvent| {
            if event.target != kind {
                return;
            }
            match event.payload {
                UiPayload::Finished(report) => done = Some(*report),
                other => on_event(&other),
            }
        };

        match receiver.recv_timeout(tick) {
            Some(event) => {
                apply(event);
                receiver.drain(&mut apply);
            }
            None if worker_done() => {
                receiver.drain(&mut apply);
                return done;
            }
            None => {}
        }

        if done.is_some() {
            return done;
        }
    }
}

fn print_summary(report: &RunReport, log_dir: &str) {
    println!();
    println!("{} {}", Theme::state(report.state), report.headline());
    for step in &report.steps {
        println!(
            "  {}. {:<24} {}",
            step.index,
            step.name,
            Theme::outcome(&step.outcome)
        );
    }
    if let Some(tally) = report.tally() {
        println!("  {}", Theme::success(&tally.freed()));
    }
    println!();
    println!("{}", Theme::muted(&format!("Logs: {log_dir}")));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maintenance::RunResult;
    use crate::ui_channel::ui_channel;
    use chrono::Local;
    use std::thread;

    fn report(kind: OperationKind) -> RunReport {
        RunReport {
            operation: kind,
            state: RunState::Completed,
            result: RunResult::Success,
            steps: Vec::new(),
            started_at: Local::now(),
            finished_at: Local::now(),
        }
    }

    #[test]
    fn test_follow_returns_report_and_sees_events_in_order() {
        let (tx, mut rx) = ui_channel();
        let producer = thread::spawn(move || {
            tx.info(OperationKind::Defragment, "first");
            tx.send(OperationKind::Defragment, UiPayload::Progress(0.5));
            tx.info(OperationKind::HealthCheck, "other operation");
            tx.info(OperationKind::Defragment, "second");
            tx.send(
                OperationKind::Defragment,
                UiPayload::Finished(Box::new(report(OperationKind::Defragment))),
            );
        });

        let mut seen = Vec::new();
        let finished = follow(
            &mut rx,
            OperationKind::Defragment,
            Duration::from_millis(10),
            || false,
            |payload| {
                if let UiPayload::Info(m) = payload {
                    seen.push(m.clone());
                }
            },
        );
        producer.join().unwrap();

        assert_eq!(finished.map(|r| r.operation), Some(OperationKind::Defragment));
        assert_eq!(seen, vec!["first", "second"]);
    }

    #[test]
    fn test_follow_gives_up_when_worker_is_gone() {
        let (_tx, mut rx) = ui_channel();
        let finished = follow(
            &mut rx,
            OperationKind::DiskCleanup,
            Duration::from_millis(5),
            || true,
            |_| {},
        );
        assert!(finished.is_none());
    }
}
