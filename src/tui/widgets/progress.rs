//! Progress bar widget

use crate::spinner;
use crate::tui::theme::Styles;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

/// Render a one-line progress bar: spinner, label, bar, percentage.
///
/// The spinner only turns while `active` is set.
pub fn render_progress_bar(
    f: &mut Frame,
    area: Rect,
    label: &str,
    progress: f32,
    tick: u64,
    active: bool,
) {
    let progress = progress.clamp(0.0, 1.0);
    let percent = format!("{:>3.0}%", progress * 100.0);

    if area.width < 24 {
        let paragraph = Paragraph::new(format!("{label} {percent}")).style(Styles::primary());
        f.render_widget(paragraph, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(2),  // Spinner
            Constraint::Length(10), // Label
            Constraint::Min(10),    // Bar
            Constraint::Length(6),  // Percentage
        ])
        .split(area);

    let spinner_char = if active { spinner::frame_for_tick(tick) } else { " " };
    f.render_widget(Paragraph::new(spinner_char).style(Styles::emphasis()), chunks[0]);

    let label_text: String = label.chars().take(9).collect();
    f.render_widget(Paragraph::new(label_text).style(Styles::emphasis()), chunks[1]);

    let width = chunks[2].width as usize;
    let filled_width = ((width as f32 * progress).round() as usize).min(width);
    let has_head = active && progress < 1.0 && filled_width < width;

    let color = if progress >= 1.0 {
        Styles::success()
    } else if progress > 0.0 {
        Styles::emphasis()
    } else {
        Styles::secondary()
    };

    let mut bar_spans = Vec::new();
    if filled_width > 0 {
        bar_spans.push(Span::styled("█".repeat(filled_width), color));
    }
    if has_head {
        let frames = ["▓", "▒", "░"];
        let idx = (tick as usize / 2) % frames.len();
        bar_spans.push(Span::styled(frames[idx], color));
    }
    let empty_width = width.saturating_sub(filled_width + usize::from(has_head));
    if empty_width > 0 {
        bar_spans.push(Span::styled("·".repeat(empty_width), Styles::muted()));
    }
    f.render_widget(Paragraph::new(Line::from(bar_spans)), chunks[2]);

    f.render_widget(
        Paragraph::new(format!(" {percent}")).style(Styles::secondary()),
        chunks[3],
    );
}
