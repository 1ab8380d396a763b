//! Dashboard screen - one section per operation

use crate::maintenance::{RunResult, RunState};
use crate::tui::{
    state::{AppState, SectionState},
    theme::Styles,
    widgets::{
        progress::render_progress_bar,
        shortcuts::{get_shortcuts, render_shortcuts},
    },
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Padding, Paragraph, Wrap},
    Frame,
};

pub fn render(f: &mut Frame, app_state: &AppState) {
    let area = f.area();
    let is_small = area.height < 20 || area.width < 60;
    let shortcuts_height = if is_small { 2 } else { 3 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Header
            Constraint::Min(6),    // Sections
            Constraint::Length(1), // Notice
            Constraint::Length(shortcuts_height),
        ])
        .split(area);

    render_header(f, chunks[0]);

    let section_areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            app_state
                .sections
                .iter()
                .map(|_| Constraint::Ratio(1, app_state.sections.len() as u32))
                .collect::<Vec<_>>(),
        )
        .split(chunks[1]);

    for (i, section) in app_state.sections.iter().enumerate() {
        if let Some(section_area) = section_areas.get(i) {
            render_section(f, *section_area, section, i, i == app_state.selected, app_state.tick);
        }
    }

    super::render_notice(f, chunks[2], app_state);
    render_shortcuts(f, chunks[3], &get_shortcuts(&app_state.screen));
}

fn render_header(f: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(Span::styled(" maintkit", Styles::title())),
        Line::from(Span::styled(
            " System health checks, disk cleanup and drive optimization",
            Styles::muted(),
        )),
    ];
    f.render_widget(Paragraph::new(lines), area);
}

fn render_section(
    f: &mut Frame,
    area: Rect,
    section: &SectionState,
    index: usize,
    focused: bool,
    tick: u64,
) {
    let border_style = if focused {
        Styles::border_focused()
    } else {
        Styles::border()
    };
    let title = Line::from(vec![
        Span::styled(format!(" {} ", index + 1), Styles::emphasis()),
        Span::styled(format!("{} ", section.kind.display_name()), Styles::header()),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title)
        .padding(Padding::horizontal(1));
    let inner = block.inner(area);
    f.render_widget(block, area);

    if inner.height == 0 {
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Trigger and status
            Constraint::Length(1), // Progress
            Constraint::Min(0),    // Info panel
        ])
        .split(inner);

    let trigger_style = if focused {
        Styles::selected()
    } else {
        Styles::emphasis()
    };
    let status_line = Line::from(vec![
        Span::styled(format!("[{}]", section.kind.trigger_label()), trigger_style),
        Span::raw("  "),
        status_span(section),
    ]);
    f.render_widget(Paragraph::new(status_line), rows[0]);

    render_progress_bar(f, rows[1], "Progress", section.progress, tick, section.running);

    let visible = rows[2].height as usize;
    if visible > 0 {
        let skip = section.info.len().saturating_sub(visible);
        let lines: Vec<Line> = section
            .info
            .iter()
            .skip(skip)
            .map(|line| Line::from(Span::styled(line.as_str(), info_style(line))))
            .collect();
        f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), rows[2]);
    }
}

fn status_span(section: &SectionState) -> Span<'static> {
    if section.running {
        return match &section.current {
            Some(step) => Span::styled(
                format!("Step {}/{}: {}", step.index, step.total, step.name),
                Styles::emphasis(),
            ),
            None => Span::styled("Running...", Styles::emphasis()),
        };
    }

    match &section.last_report {
        Some(report) => {
            let style = match report.state {
                RunState::Completed if matches!(report.result, RunResult::Success) => Styles::success(),
                RunState::Completed => Styles::warning(),
                _ => Styles::error(),
            };
            Span::styled(report.headline(), style)
        }
        None => Span::styled("Idle", Styles::muted()),
    }
}

/// Colour panel lines by the wording the pipeline uses for failures.
fn info_style(line: &str) -> ratatui::style::Style {
    if line.contains("failed")
        || line.contains("timed out")
        || line.contains("Error")
        || line.contains("Permission denied")
        || line.contains("privileges are required")
    {
        Styles::error()
    } else if line.contains("In use") || line.contains("already running") {
        Styles::warning()
    } else if line.contains("completed") {
        Styles::success()
    } else {
        Styles::primary()
    }
}
