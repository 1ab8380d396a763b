//! Starts operation runs on worker threads.
//!
//! Each trigger spawns a fresh named thread. Different operations may run
//! side by side; a second run of an operation that is still in flight is
//! refused with [`MaintError::AlreadyRunning`].

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Local;

use super::catalog::Catalog;
use super::operation::{Operation, OperationKind};
use super::pipeline::{run_operation, RunContext};
use super::report::{RunReport, RunResult, RunState};
use crate::error::MaintError;
use crate::log_sink::Level;
use crate::ui_channel::UiPayload;

type Flags = Arc<BTreeMap<OperationKind, AtomicBool>>;

#[derive(Clone)]
pub struct Launcher {
    ctx: Arc<RunContext>,
    catalog: Arc<Catalog>,
    running: Flags,
}

/// Clears the in-flight flag when the worker ends, however it ends.
struct InFlight {
    running: Flags,
    kind: OperationKind,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(flag) = self.running.get(&self.kind) {
            flag.store(false, Ordering::Release);
        }
    }
}

impl Launcher {
    pub fn new(ctx: RunContext, catalog: Catalog) -> Self {
        let running = OperationKind::ALL
            .iter()
            .map(|&kind| (kind, AtomicBool::new(false)))
            .collect();
        Self {
            ctx: Arc::new(ctx),
            catalog: Arc::new(catalog),
            running: Arc::new(running),
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn is_running(&self, kind: OperationKind) -> bool {
        self.running
            .get(&kind)
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    /// Start `kind` on a new worker thread.
    ///
    /// The worker's report also arrives on the UI channel as
    /// [`UiPayload::Finished`], so callers may drop the handle.
    pub fn launch(&self, kind: OperationKind) -> Result<JoinHandle<RunReport>, MaintError> {
        let claimed = self.running.get(&kind).is_some_and(|flag| {
            flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        });
        if !claimed {
            let err = MaintError::AlreadyRunning {
                operation: kind.display_name(),
            };
            tracing::warn!(operation = kind.display_name(), "run refused, already in flight");
            self.ctx
                .announce(kind, kind.channel(), Level::Warning, err.to_string());
            return Err(err);
        }

        let guard = InFlight {
            running: Arc::clone(&self.running),
            kind,
        };
        let ctx = Arc::clone(&self.ctx);
        let operation = self.catalog.get(kind);

        thread::Builder::new()
            .name(format!("maintkit-{}", kind_slug(kind)))
            .spawn(move || {
                let _guard = guard;
                run_caught(&ctx, &operation)
            })
            .map_err(|source| {
                tracing::error!(error = %source, "failed to spawn worker thread");
                MaintError::WorkerSpawn {
                    operation: kind.display_name(),
                    source,
                }
            })
    }
}

fn kind_slug(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::HealthCheck => "health-check",
        OperationKind::DiskCleanup => "disk-cleanup",
        OperationKind::Defragment => "defragment",
    }
}

/// Run the pipeline, turning a panic into a `Failed` report.
fn run_caught(ctx: &RunContext, operation: &Operation) -> RunReport {
    let started_at = Local::now();
    match panic::catch_unwind(AssertUnwindSafe(|| run_operation(ctx, operation))) {
        Ok(report) => report,
        Err(payload) => {
            let kind = operation.kind;
            let err = MaintError::WorkerPanicked {
                operation: kind.display_name(),
                detail: panic_detail(payload.as_ref()),
            };
            tracing::error!(error = %err, "worker panicked");
            ctx.announce(kind, kind.channel(), Level::Error, err.to_string());

            let report = RunReport {
                operation: kind,
                state: RunState::Failed,
                result: RunResult::Error {
                    message: err.to_string(),
                },
                steps: Vec::new(),
                started_at,
                finished_at: Local::now(),
            };
            ctx.events.send(kind, UiPayload::Progress(1.0));
            ctx.events
                .send(kind, UiPayload::ResetProgressAfter(ctx.progress_reset_delay));
            ctx.events
                .send(kind, UiPayload::Finished(Box::new(report.clone())));
            report
        }
    }
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::log_sink::{ChannelId, LogSink};
    use crate::maintenance::cleanup::FsRemover;
    use crate::privilege::PrivilegeGate;
    use crate::process::{CommandLine, ProcessOutput, ProcessRunner, ProgressTick, RunError};
    use crate::ui_channel::{ui_channel, UiReceiver};
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Blocks every command until the test releases it.
    struct GatedRunner {
        release: Mutex<mpsc::Receiver<()>>,
        panic_on: Option<&'static str>,
    }

    impl ProcessRunner for GatedRunner {
        fn run(&self, command: &CommandLine, _timeout: Duration) -> Result<ProcessOutput, RunError> {
            if self.panic_on == Some(command.as_str()) {
                panic!("runner exploded on {command}");
            }
            let _ = self.release.lock().unwrap().recv_timeout(Duration::from_secs(10));
            Ok(ProcessOutput {
                exit_code: 0,
                output: String::new(),
            })
        }

        fn run_with_progress(
            &self,
            command: &CommandLine,
            _estimated_steps: u32,
            timeout: Option<Duration>,
            _on_tick: &mut dyn FnMut(ProgressTick),
        ) -> Result<ProcessOutput, RunError> {
            self.run(command, timeout.unwrap_or_default())
        }
    }

    struct Allow;

    impl PrivilegeGate for Allow {
        fn has_privilege(&self) -> bool {
            true
        }
    }

    fn launcher(
        dir: &std::path::Path,
        panic_on: Option<&'static str>,
    ) -> (Launcher, UiReceiver, mpsc::Sender<()>) {
        let (release_tx, release_rx) = mpsc::channel();
        let (events, rx) = ui_channel();
        let ctx = RunContext {
            sink: Arc::new(LogSink::new(dir)),
            runner: Arc::new(GatedRunner {
                release: Mutex::new(release_rx),
                panic_on,
            }),
            gate: Arc::new(Allow),
            remover: Arc::new(FsRemover),
            events,
            progress_reset_delay: Duration::from_millis(10),
        };
        let mut config = Config::default();
        config.health_check.commands.truncate(1);
        config.cleanup.paths.clear();
        let catalog = Catalog::from_config(&config).unwrap();
        (Launcher::new(ctx, catalog), rx, release_tx)
    }

    #[test]
    fn test_second_run_of_same_operation_is_refused() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (launcher, _rx, release) = launcher(temp_dir.path(), None);

        let first = launcher.launch(OperationKind::HealthCheck).unwrap();
        assert!(launcher.is_running(OperationKind::HealthCheck));

        let second = launcher.launch(OperationKind::HealthCheck);
        assert!(matches!(second, Err(MaintError::AlreadyRunning { .. })));

        // A different operation is not blocked.
        let other = launcher.launch(OperationKind::DiskCleanup).unwrap();
        assert_eq!(other.join().unwrap().state, RunState::Completed);

        release.send(()).unwrap();
        assert_eq!(first.join().unwrap().state, RunState::Completed);
        assert!(!launcher.is_running(OperationKind::HealthCheck));

        let summary = launcher
            .context()
            .sink
            .read(ChannelId::SystemHealthCheck)
            .unwrap()
            .unwrap();
        assert!(summary.contains("WARNING - System Health Check is already running"));

        // Free again once the first run ended.
        let again = launcher.launch(OperationKind::HealthCheck).unwrap();
        release.send(()).unwrap();
        assert_eq!(again.join().unwrap().state, RunState::Completed);
    }

    #[test]
    fn test_panicking_run_becomes_failed_report() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (launcher, mut rx, _release) = launcher(temp_dir.path(), Some("defrag C: /OPTIMIZE"));

        let report = launcher.launch(OperationKind::Defragment).unwrap().join().unwrap();

        assert_eq!(report.state, RunState::Failed);
        assert!(matches!(
            &report.result,
            RunResult::Error { message } if message.contains("runner exploded")
        ));
        assert!(!launcher.is_running(OperationKind::Defragment));

        let mut finished = 0;
        rx.drain(|event| {
            if matches!(event.payload, UiPayload::Finished(_)) {
                finished += 1;
            }
        });
        assert_eq!(finished, 1);
    }
}
