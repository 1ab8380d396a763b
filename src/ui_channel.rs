//! Cross-thread queue between maintenance workers and the UI thread.
//!
//! Workers only ever describe a change; the thread that owns the UI state
//! drains the queue on its tick and applies the changes itself.

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::maintenance::{OperationKind, RunReport, StepOutcome};

/// A deferred UI mutation addressed to one operation's section.
#[derive(Debug, Clone)]
pub struct UiEvent {
    pub target: OperationKind,
    pub payload: UiPayload,
}

#[derive(Debug, Clone)]
pub enum UiPayload {
    /// Empty the section's info panel.
    ClearPanel,
    /// Append a line to the info panel.
    Info(String),
    /// Set the progress bar, 0.0..=1.0.
    Progress(f32),
    StepStarted {
        index: usize,
        total: usize,
        name: String,
    },
    StepFinished {
        index: usize,
        total: usize,
        name: String,
        outcome: StepOutcome,
    },
    /// Terminal report of a run.
    Finished(Box<RunReport>),
    /// Put the progress bar back to zero once `delay` has passed.
    ResetProgressAfter(Duration),
}

/// Producer side. Cheap to clone, usable from any thread, never blocks.
#[derive(Debug, Clone)]
pub struct UiSender {
    tx: Sender<UiEvent>,
}

/// Consumer side, held by the thread that owns the UI state.
#[derive(Debug)]
pub struct UiReceiver {
    rx: Receiver<UiEvent>,
}

pub fn ui_channel() -> (UiSender, UiReceiver) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (UiSender { tx }, UiReceiver { rx })
}

impl UiSender {
    pub fn enqueue(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            // The UI is gone (shutting down); nothing left to update.
            tracing::debug!("ui channel closed, dropping event");
        }
    }

    pub fn send(&self, target: OperationKind, payload: UiPayload) {
        self.enqueue(UiEvent { target, payload });
    }

    pub fn info(&self, target: OperationKind, message: impl Into<String>) {
        self.send(target, UiPayload::Info(message.into()));
    }
}

impl UiReceiver {
    /// Apply every event queued so far, oldest first. Returns how many ran.
    ///
    /// Events enqueued while draining are left for the next tick.
    pub fn drain(&mut self, mut apply: impl FnMut(UiEvent)) -> usize {
        let pending = self.rx.len();
        let mut applied = 0;
        while applied < pending {
            match self.rx.try_recv() {
                Ok(event) => {
                    apply(event);
                    applied += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        applied
    }

    /// Block for up to `timeout` for the next event. Used by headless runs.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<UiEvent> {
        self.rx.recv_timeout(timeout).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_drain_is_fifo() {
        let (tx, mut rx) = ui_channel();
        for i in 0..5 {
            tx.info(OperationKind::DiskCleanup, format!("message {i}"));
        }

        let mut seen = Vec::new();
        let applied = rx.drain(|event| {
            if let UiPayload::Info(msg) = event.payload {
                seen.push(msg);
            }
        });

        assert_eq!(applied, 5);
        assert_eq!(
            seen,
            (0..5).map(|i| format!("message {i}")).collect::<Vec<_>>()
        );
        assert_eq!(rx.drain(|_| {}), 0);
    }

    #[test]
    fn test_producers_on_other_threads() {
        let (tx, mut rx) = ui_channel();
        let handles: Vec<_> = OperationKind::ALL
            .into_iter()
            .map(|kind| {
                let tx = tx.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        tx.send(kind, UiPayload::Progress(i as f32 / 50.0));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut per_kind: std::collections::HashMap<OperationKind, Vec<f32>> = Default::default();
        rx.drain(|event| {
            if let UiPayload::Progress(value) = event.payload {
                per_kind.entry(event.target).or_default().push(value);
            }
        });

        // Each producer's own events stay in order.
        for values in per_kind.values() {
            assert_eq!(values.len(), 50);
            assert!(values.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_enqueue_after_receiver_dropped_does_not_panic() {
        let (tx, rx) = ui_channel();
        drop(rx);
        tx.info(OperationKind::Defragment, "late");
    }
}
