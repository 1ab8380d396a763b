//! Event handling for TUI
//!
//! Key handling only updates navigation state; anything that touches the
//! launcher or the log sink is returned as an [`EventResult`] for the loop.

use crossterm::event::{KeyCode, KeyModifiers};

use crate::log_sink::ChannelId;
use crate::maintenance::OperationKind;
use crate::tui::state::{AppState, Screen};

/// Lines moved by PageUp/PageDown in the log viewer
const PAGE: i32 = 10;

/// Result of handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Continue,
    Quit,
    Start(OperationKind),
    OpenLogs(OperationKind),
    ClearAllLogs,
    ClearChannel(ChannelId),
    /// The log viewer switched tabs or asked for a reload
    ReloadLog,
}

/// Handle a keyboard event
pub fn handle_event(app_state: &mut AppState, key: KeyCode, modifiers: KeyModifiers) -> EventResult {
    if modifiers.contains(KeyModifiers::CONTROL) && key == KeyCode::Char('c') {
        return EventResult::Quit;
    }

    match app_state.screen {
        Screen::Dashboard => handle_dashboard_event(app_state, key),
        Screen::LogViewer(_) => handle_viewer_event(app_state, key),
    }
}

fn handle_dashboard_event(app_state: &mut AppState, key: KeyCode) -> EventResult {
    match key {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => EventResult::Quit,
        KeyCode::Up | KeyCode::Char('k') | KeyCode::BackTab => {
            app_state.select_prev();
            EventResult::Continue
        }
        KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => {
            app_state.select_next();
            EventResult::Continue
        }
        KeyCode::Char(c @ '1'..='3') => {
            let index = c as usize - '1' as usize;
            match OperationKind::ALL.get(index) {
                Some(kind) => EventResult::Start(*kind),
                None => EventResult::Continue,
            }
        }
        KeyCode::Enter | KeyCode::Char(' ') => EventResult::Start(app_state.selected_kind()),
        KeyCode::Char('l') | KeyCode::Char('L') => EventResult::OpenLogs(app_state.selected_kind()),
        KeyCode::Char('c') | KeyCode::Char('C') => EventResult::ClearAllLogs,
        _ => EventResult::Continue,
    }
}

fn handle_viewer_event(app_state: &mut AppState, key: KeyCode) -> EventResult {
    let Screen::LogViewer(viewer) = &mut app_state.screen else {
        return EventResult::Continue;
    };

    match key {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Backspace => {
            app_state.screen = Screen::Dashboard;
            EventResult::Continue
        }
        KeyCode::Tab | KeyCode::Right => {
            viewer.next_tab();
            EventResult::ReloadLog
        }
        KeyCode::BackTab | KeyCode::Left => {
            viewer.prev_tab();
            EventResult::ReloadLog
        }
        KeyCode::Up | KeyCode::Char('k') => {
            viewer.scroll_by(-1);
            EventResult::Continue
        }
        KeyCode::Down | KeyCode::Char('j') => {
            viewer.scroll_by(1);
            EventResult::Continue
        }
        KeyCode::PageUp => {
            viewer.scroll_by(-PAGE);
            EventResult::Continue
        }
        KeyCode::PageDown => {
            viewer.scroll_by(PAGE);
            EventResult::Continue
        }
        KeyCode::Home => {
            viewer.scroll = 0;
            EventResult::Continue
        }
        KeyCode::End => {
            viewer.scroll_by(i32::from(u16::MAX));
            EventResult::Continue
        }
        KeyCode::Char('r') | KeyCode::Char('R') => EventResult::ReloadLog,
        KeyCode::Char('x') | KeyCode::Char('X') => EventResult::ClearChannel(viewer.channel()),
        _ => EventResult::Continue,
    }
}
