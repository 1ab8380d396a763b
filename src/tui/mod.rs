//! TUI module for the interactive dashboard
//!
//! The thread running [`run`] owns every piece of UI state. Maintenance runs
//! happen on worker threads started by the [`Launcher`]; their updates are
//! drained from the UI channel once per tick and applied here.

pub mod events;
pub mod screens;
pub mod state;
pub mod theme;
pub mod widgets;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};

use self::events::{handle_event, EventResult};
use self::screens::render;
use self::state::{AppState, LogViewer, Screen};
use crate::cli::{bootstrap, Runtime};
use crate::config::Config;
use crate::error::MaintError;
use crate::log_sink::ChannelId;
use crate::maintenance::{Launcher, OperationKind};
use crate::ui_channel::UiReceiver;

type Term = Terminal<CrosstermBackend<Stdout>>;

/// Run the TUI application
pub fn run(config: &Config) -> Result<()> {
    let Runtime {
        launcher,
        mut receiver,
    } = bootstrap(config)?;
    let mut app_state = AppState::new(config.ui.panel_lines);

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(out))?;

    let result = event_loop(
        &mut terminal,
        &mut app_state,
        &launcher,
        &mut receiver,
        config.tick(),
    );

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if OperationKind::ALL.iter().any(|kind| launcher.is_running(*kind)) {
        tracing::warn!("dashboard closed while operations were still running");
    }
    result
}

fn event_loop(
    terminal: &mut Term,
    app_state: &mut AppState,
    launcher: &Launcher,
    receiver: &mut UiReceiver,
    tick: Duration,
) -> Result<()> {
    loop {
        app_state.tick = app_state.tick.wrapping_add(1);

        let now = Instant::now();
        let mut touched: Vec<OperationKind> = Vec::new();
        receiver.drain(|event| {
            if !touched.contains(&event.target) {
                touched.push(event.target);
            }
            app_state.apply(event, now);
        });
        app_state.expire(now);

        let viewed_changed = matches!(
            &app_state.screen,
            Screen::LogViewer(viewer) if touched.contains(&viewer.operation)
        );
        if viewed_changed {
            reload_viewer(app_state, launcher);
        }

        terminal.draw(|f| render(f, app_state))?;

        if !event::poll(tick)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match handle_event(app_state, key.code, key.modifiers) {
            EventResult::Quit => break,
            EventResult::Continue => {}
            EventResult::Start(kind) => start(app_state, launcher, kind),
            EventResult::OpenLogs(kind) => open_logs(app_state, launcher, kind),
            EventResult::ClearAllLogs => clear_all_logs(app_state, launcher),
            EventResult::ClearChannel(channel) => clear_channel(app_state, launcher, channel),
            EventResult::ReloadLog => reload_viewer(app_state, launcher),
        }
    }
    Ok(())
}

fn start(app_state: &mut AppState, launcher: &Launcher, kind: OperationKind) {
    match launcher.launch(kind) {
        // Detached: completion arrives through the UI channel.
        Ok(_worker) => app_state.mark_started(kind),
        Err(err @ MaintError::AlreadyRunning { .. }) => app_state.notify(err.to_string(), true),
        Err(err) => {
            tracing::error!(operation = ?kind, error = %err, "failed to start operation");
            app_state.notify(err.to_string(), true);
        }
    }
}

fn open_logs(app_state: &mut AppState, launcher: &Launcher, kind: OperationKind) {
    let channels = launcher.catalog().get(kind).channels();
    app_state.screen = Screen::LogViewer(LogViewer::new(kind, channels));
    reload_viewer(app_state, launcher);
}

fn reload_viewer(app_state: &mut AppState, launcher: &Launcher) {
    let Screen::LogViewer(viewer) = &mut app_state.screen else {
        return;
    };
    let channel = viewer.channel();
    viewer.content = match launcher.context().sink.read(channel) {
        Ok(Some(content)) if content.is_empty() => "(empty)".to_string(),
        Ok(Some(content)) => content,
        Ok(None) => format!("No log file found for {}.", channel.label()),
        Err(err) => format!("Error reading log file: {err}"),
    };
    viewer.scroll_by(0);
}

fn clear_all_logs(app_state: &mut AppState, launcher: &Launcher) {
    match launcher.context().sink.clear_all() {
        Ok(()) => app_state.notify("All logs cleared successfully.", false),
        Err(errors) => {
            for err in &errors {
                tracing::warn!(error = %err, "failed to clear log channel");
            }
            app_state.notify(
                format!("{} log channel(s) could not be cleared", errors.len()),
                true,
            );
        }
    }
    reload_viewer(app_state, launcher);
}

fn clear_channel(app_state: &mut AppState, launcher: &Launcher, channel: ChannelId) {
    match launcher.context().sink.clear(channel) {
        Ok(()) => app_state.notify(format!("{} has been cleared.", channel.file_name()), false),
        Err(err) => app_state.notify(format!("Failed to clear log file: {err}"), true),
    }
    reload_viewer(app_state, launcher);
}
