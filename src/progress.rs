use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::spinner;

/// Resolution of a fractional run bar.
const BAR_UNITS: u64 = 1000;

/// Create a spinner for indeterminate progress
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(spinner::tick_chars());
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Create a bar driven by a 0.0..=1.0 run fraction
///
/// Shows: spinner, progress bar, percent, elapsed time, message
pub fn create_run_bar(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(BAR_UNITS);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {percent:>3}% ({elapsed}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .tick_chars(spinner::tick_chars())
        .progress_chars("█▓░");
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Move a run bar to `fraction` of its length
pub fn set_fraction(pb: &ProgressBar, fraction: f32) {
    let position = (fraction.clamp(0.0, 1.0) * BAR_UNITS as f32).round() as u64;
    pb.set_position(position);
}

/// Finish progress bar with a final message
pub fn finish_with_message(pb: &ProgressBar, msg: &str) {
    pb.finish_with_message(msg.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_spinner() {
        let pb = create_spinner("Clearing logs");
        assert!(!pb.is_finished());
        pb.finish();
        assert!(pb.is_finished());
    }

    #[test]
    fn test_run_bar_tracks_fraction() {
        let pb = create_run_bar("System Health Check");
        assert_eq!(pb.length(), Some(BAR_UNITS));
        set_fraction(&pb, 0.5);
        assert_eq!(pb.position(), 500);
        set_fraction(&pb, 1.5);
        assert_eq!(pb.position(), BAR_UNITS);
        finish_with_message(&pb, "done");
        assert!(pb.is_finished());
    }
}
