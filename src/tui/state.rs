//! Dashboard state
//!
//! Owned by the UI thread. Workers never touch it; their updates arrive as
//! [`UiEvent`]s and are applied here during the drain on each tick.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::log_sink::ChannelId;
use crate::maintenance::{OperationKind, RunReport};
use crate::ui_channel::{UiEvent, UiPayload};

/// How long a notice stays in the status line
pub const NOTICE_TTL: Duration = Duration::from_secs(4);

/// Step currently executing in a section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentStep {
    pub index: usize,
    pub total: usize,
    pub name: String,
}

/// One operation's area on the dashboard: trigger, progress bar, info panel.
#[derive(Debug, Clone)]
pub struct SectionState {
    pub kind: OperationKind,
    pub progress: f32,
    pub info: VecDeque<String>,
    pub running: bool,
    pub current: Option<CurrentStep>,
    pub reset_at: Option<Instant>,
    pub last_report: Option<RunReport>,
}

impl SectionState {
    fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            progress: 0.0,
            info: VecDeque::new(),
            running: false,
            current: None,
            reset_at: None,
            last_report: None,
        }
    }

    fn push_info(&mut self, message: &str, limit: usize) {
        for line in message.lines() {
            self.info.push_back(line.to_string());
        }
        while self.info.len() > limit {
            self.info.pop_front();
        }
    }
}

/// Per-operation log viewer with one tab per channel.
#[derive(Debug, Clone)]
pub struct LogViewer {
    pub operation: OperationKind,
    pub channels: Vec<ChannelId>,
    pub tab: usize,
    pub scroll: u16,
    /// Content of the active tab, or the reason it could not be shown
    pub content: String,
}

impl LogViewer {
    pub fn new(operation: OperationKind, channels: Vec<ChannelId>) -> Self {
        Self {
            operation,
            channels,
            tab: 0,
            scroll: 0,
            content: String::new(),
        }
    }

    pub fn channel(&self) -> ChannelId {
        self.channels
            .get(self.tab)
            .copied()
            .unwrap_or_else(|| self.operation.channel())
    }

    pub fn next_tab(&mut self) {
        if !self.channels.is_empty() {
            self.tab = (self.tab + 1) % self.channels.len();
            self.scroll = 0;
        }
    }

    pub fn prev_tab(&mut self) {
        if !self.channels.is_empty() {
            self.tab = (self.tab + self.channels.len() - 1) % self.channels.len();
            self.scroll = 0;
        }
    }

    pub fn scroll_by(&mut self, delta: i32) {
        let max = self.content.lines().count().saturating_sub(1) as i32;
        self.scroll = (self.scroll as i32 + delta).clamp(0, max.max(0)) as u16;
    }
}

#[derive(Debug, Clone)]
pub enum Screen {
    Dashboard,
    LogViewer(LogViewer),
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub text: String,
    pub is_error: bool,
    pub shown_at: Instant,
}

pub struct AppState {
    pub sections: Vec<SectionState>,
    pub selected: usize,
    pub screen: Screen,
    pub notice: Option<Notice>,
    pub tick: u64,
    pub panel_lines: usize,
}

impl AppState {
    pub fn new(panel_lines: usize) -> Self {
        Self {
            sections: OperationKind::ALL.into_iter().map(SectionState::new).collect(),
            selected: 0,
            screen: Screen::Dashboard,
            notice: None,
            tick: 0,
            panel_lines: panel_lines.max(1),
        }
    }

    pub fn section(&self, kind: OperationKind) -> Option<&SectionState> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    fn section_mut(&mut self, kind: OperationKind) -> Option<&mut SectionState> {
        self.sections.iter_mut().find(|s| s.kind == kind)
    }

    pub fn selected_kind(&self) -> OperationKind {
        self.sections
            .get(self.selected)
            .map(|s| s.kind)
            .unwrap_or(OperationKind::HealthCheck)
    }

    pub fn select_next(&mut self) {
        self.selected = (self.selected + 1) % self.sections.len();
    }

    pub fn select_prev(&mut self) {
        self.selected = (self.selected + self.sections.len() - 1) % self.sections.len();
    }

    /// Mark a section as running right after its worker was launched.
    pub fn mark_started(&mut self, kind: OperationKind) {
        if let Some(section) = self.section_mut(kind) {
            section.running = true;
            section.progress = 0.0;
            section.reset_at = None;
        }
    }

    /// Apply one update from a worker. Called only from the drain.
    pub fn apply(&mut self, event: UiEvent, now: Instant) {
        let limit = self.panel_lines;
        let Some(section) = self.section_mut(event.target) else {
            return;
        };

        match event.payload {
            UiPayload::ClearPanel => section.info.clear(),
            UiPayload::Info(message) => section.push_info(&message, limit),
            UiPayload::Progress(value) => {
                section.progress = value.clamp(0.0, 1.0);
                section.reset_at = None;
            }
            UiPayload::StepStarted { index, total, name } => {
                section.running = true;
                section.current = Some(CurrentStep { index, total, name });
            }
            UiPayload::StepFinished { .. } => section.current = None,
            UiPayload::Finished(report) => {
                section.running = false;
                section.current = None;
                section.last_report = Some(*report);
            }
            UiPayload::ResetProgressAfter(delay) => section.reset_at = Some(now + delay),
        }
    }

    /// Put finished progress bars back to zero and drop stale notices.
    pub fn expire(&mut self, now: Instant) {
        for section in &mut self.sections {
            if section.reset_at.is_some_and(|at| at <= now) {
                section.progress = 0.0;
                section.reset_at = None;
            }
        }
        if self
            .notice
            .as_ref()
            .is_some_and(|n| now.duration_since(n.shown_at) >= NOTICE_TTL)
        {
            self.notice = None;
        }
    }

    pub fn notify(&mut self, text: impl Into<String>, is_error: bool) {
        self.notice = Some(Notice {
            text: text.into(),
            is_error,
            shown_at: Instant::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maintenance::{RunResult, RunState};
    use chrono::Local;

    fn event(target: OperationKind, payload: UiPayload) -> UiEvent {
        UiEvent { target, payload }
    }

    #[test]
    fn test_info_panel_is_capped() {
        let mut app = AppState::new(3);
        let now = Instant::now();
        for i in 0..5 {
            app.apply(
                event(OperationKind::DiskCleanup, UiPayload::Info(format!("line {i}"))),
                now,
            );
        }
        let info: Vec<_> = app
            .section(OperationKind::DiskCleanup)
            .unwrap()
            .info
            .iter()
            .cloned()
            .collect();
        assert_eq!(info, vec!["line 2", "line 3", "line 4"]);
        assert!(app.section(OperationKind::HealthCheck).unwrap().info.is_empty());
    }

    #[test]
    fn test_clear_panel_then_info() {
        let mut app = AppState::new(10);
        let now = Instant::now();
        app.apply(event(OperationKind::Defragment, UiPayload::Info("old".into())), now);
        app.apply(event(OperationKind::Defragment, UiPayload::ClearPanel), now);
        app.apply(event(OperationKind::Defragment, UiPayload::Info("new".into())), now);
        let section = app.section(OperationKind::Defragment).unwrap();
        assert_eq!(section.info.len(), 1);
        assert_eq!(section.info[0], "new");
    }

    #[test]
    fn test_progress_resets_after_delay() {
        let mut app = AppState::new(10);
        let now = Instant::now();
        let kind = OperationKind::HealthCheck;
        app.apply(event(kind, UiPayload::Progress(1.0)), now);
        app.apply(
            event(kind, UiPayload::ResetProgressAfter(Duration::from_secs(1))),
            now,
        );

        app.expire(now + Duration::from_millis(500));
        assert_eq!(app.section(kind).unwrap().progress, 1.0);

        app.expire(now + Duration::from_secs(1));
        assert_eq!(app.section(kind).unwrap().progress, 0.0);
        assert!(app.section(kind).unwrap().reset_at.is_none());
    }

    #[test]
    fn test_new_progress_cancels_pending_reset() {
        let mut app = AppState::new(10);
        let now = Instant::now();
        let kind = OperationKind::HealthCheck;
        app.apply(event(kind, UiPayload::ResetProgressAfter(Duration::ZERO)), now);
        app.apply(event(kind, UiPayload::Progress(0.25)), now);
        app.expire(now + Duration::from_secs(5));
        assert_eq!(app.section(kind).unwrap().progress, 0.25);
    }

    #[test]
    fn test_step_and_finish_track_running() {
        let mut app = AppState::new(10);
        let now = Instant::now();
        let kind = OperationKind::Defragment;
        app.apply(
            event(
                kind,
                UiPayload::StepStarted {
                    index: 1,
                    total: 2,
                    name: "defrag C:".into(),
                },
            ),
            now,
        );
        assert!(app.section(kind).unwrap().running);
        assert_eq!(app.section(kind).unwrap().current.as_ref().unwrap().index, 1);

        let report = RunReport {
            operation: kind,
            state: RunState::Completed,
            result: RunResult::Success,
            steps: Vec::new(),
            started_at: Local::now(),
            finished_at: Local::now(),
        };
        app.apply(event(kind, UiPayload::Finished(Box::new(report))), now);
        let section = app.section(kind).unwrap();
        assert!(!section.running);
        assert!(section.current.is_none());
        assert_eq!(section.last_report.as_ref().unwrap().state, RunState::Completed);
    }

    #[test]
    fn test_selection_wraps() {
        let mut app = AppState::new(10);
        app.select_prev();
        assert_eq!(app.selected_kind(), OperationKind::Defragment);
        app.select_next();
        assert_eq!(app.selected_kind(), OperationKind::HealthCheck);
    }

    #[test]
    fn test_viewer_tabs_and_scroll() {
        let mut viewer = LogViewer::new(
            OperationKind::HealthCheck,
            vec![ChannelId::SystemHealthCheck, ChannelId::CheckHealth],
        );
        viewer.content = "a\nb\nc".into();
        viewer.scroll_by(10);
        assert_eq!(viewer.scroll, 2);
        viewer.scroll_by(-5);
        assert_eq!(viewer.scroll, 0);

        viewer.prev_tab();
        assert_eq!(viewer.channel(), ChannelId::CheckHealth);
        viewer.next_tab();
        assert_eq!(viewer.channel(), ChannelId::SystemHealthCheck);
    }
}
