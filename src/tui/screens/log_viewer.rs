//! Log viewer screen - one tab per channel of the chosen operation

use crate::tui::{
    state::{AppState, LogViewer, Screen},
    theme::Styles,
    widgets::shortcuts::{get_shortcuts, render_shortcuts},
};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    text::{Line, Span},
    widgets::{Block, Borders, Padding, Paragraph, Tabs, Wrap},
    Frame,
};

pub fn render(f: &mut Frame, app_state: &AppState) {
    let Screen::LogViewer(viewer) = &app_state.screen else {
        return;
    };
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Min(3),    // Content
            Constraint::Length(1), // Notice
            Constraint::Length(3), // Shortcuts
        ])
        .split(area);

    render_tabs(f, chunks[0], viewer);

    let title = format!(
        " {} Log - {} ",
        viewer.operation.display_name(),
        viewer.channel().file_name()
    );
    let lines: Vec<Line> = viewer
        .content
        .lines()
        .map(|line| Line::from(Span::styled(line, line_style(line))))
        .collect();
    let content = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Styles::border())
                .title(Span::styled(title, Styles::header()))
                .padding(Padding::horizontal(1)),
        )
        .wrap(Wrap { trim: false })
        .scroll((viewer.scroll, 0));
    f.render_widget(content, chunks[1]);

    super::render_notice(f, chunks[2], app_state);
    render_shortcuts(f, chunks[3], &get_shortcuts(&app_state.screen));
}

fn render_tabs(f: &mut Frame, area: ratatui::layout::Rect, viewer: &LogViewer) {
    let titles: Vec<Line> = viewer
        .channels
        .iter()
        .map(|channel| Line::from(channel.label()))
        .collect();
    let tabs = Tabs::new(titles)
        .select(viewer.tab)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Styles::border()),
        )
        .style(Styles::secondary())
        .highlight_style(Styles::selected())
        .divider(Span::styled("|", Styles::muted()));
    f.render_widget(tabs, area);
}

fn line_style(line: &str) -> ratatui::style::Style {
    if line.contains(" - ERROR - ") {
        Styles::error()
    } else if line.contains(" - WARNING - ") {
        Styles::warning()
    } else if line.contains(" - DEBUG - ") {
        Styles::muted()
    } else {
        Styles::primary()
    }
}
