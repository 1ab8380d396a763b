//! Plain text theme - no colors, no emojis
//! Simple, clean text-only output for the command line

use crate::maintenance::{RunState, StepOutcome};

/// Plain text formatting utilities
pub struct Theme;

impl Theme {
    /// Plain text (no styling)
    pub fn success(text: &str) -> String {
        text.to_string()
    }

    /// Plain text (no styling)
    pub fn error(text: &str) -> String {
        text.to_string()
    }

    /// Plain text (no styling)
    pub fn muted(text: &str) -> String {
        text.to_string()
    }

    /// Plain text (no styling)
    pub fn header(text: &str) -> String {
        text.to_string()
    }

    /// Plain divider line
    pub fn divider(width: usize) -> String {
        "-".repeat(width)
    }

    /// Plain double divider
    pub fn divider_bold(width: usize) -> String {
        "=".repeat(width)
    }

    /// Fixed-width tag for a terminal run state
    pub fn state(state: RunState) -> String {
        let tag = match state {
            RunState::Completed => "OK",
            RunState::Aborted => "SKIP",
            RunState::TimedOut => "TIME",
            RunState::Failed => "FAIL",
            RunState::Idle | RunState::Running => "..",
        };
        format!("[{:<4}]", tag)
    }

    /// Short description of one step's outcome
    pub fn outcome(outcome: &StepOutcome) -> String {
        match outcome {
            StepOutcome::Succeeded => "ok".to_string(),
            StepOutcome::Failed { exit_code } => format!("exit code {exit_code}"),
            StepOutcome::Cleaned(tally) => tally.summary(),
            StepOutcome::TimedOut { after_secs } => format!("timed out after {after_secs}s"),
            StepOutcome::Errored { message } => message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_tags_have_same_width() {
        let widths: Vec<usize> = [
            RunState::Completed,
            RunState::Aborted,
            RunState::TimedOut,
            RunState::Failed,
        ]
        .into_iter()
        .map(|s| Theme::state(s).len())
        .collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_outcome_text() {
        assert_eq!(Theme::outcome(&StepOutcome::Failed { exit_code: 1 }), "exit code 1");
        assert_eq!(Theme::outcome(&StepOutcome::Succeeded), "ok");
    }
}
