//! Screen rendering modules

pub mod dashboard;
pub mod log_viewer;

use crate::tui::state::{AppState, Screen};
use crate::tui::theme::Styles;
use ratatui::{layout::Rect, text::Span, widgets::Paragraph, Frame};

/// Main render function that dispatches to the appropriate screen
pub fn render(f: &mut Frame, app_state: &AppState) {
    match app_state.screen {
        Screen::Dashboard => dashboard::render(f, app_state),
        Screen::LogViewer(_) => log_viewer::render(f, app_state),
    }
}

/// One-line status message shared by every screen
fn render_notice(f: &mut Frame, area: Rect, app_state: &AppState) {
    let Some(notice) = &app_state.notice else {
        return;
    };
    let style = if notice.is_error {
        Styles::error()
    } else {
        Styles::success()
    };
    f.render_widget(
        Paragraph::new(Span::styled(format!(" {}", notice.text), style)),
        area,
    );
}
