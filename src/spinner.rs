//! Braille spinner shared by the `run` bar and the dashboard sections.

/// indicatif's default dots, in cycle order.
const FRAMES: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Each braille frame is a single three-byte code point.
const FRAME_BYTES: usize = 3;

/// Dashboard ticks a frame stays on screen.
const TICKS_PER_FRAME: u64 = 2;

pub fn frame_count() -> usize {
    FRAMES.len() / FRAME_BYTES
}

/// Frame for the dashboard tick counter.
///
/// ```
/// use maintkit::spinner::frame_for_tick;
///
/// assert_eq!(frame_for_tick(0), "⠋");
/// assert_eq!(frame_for_tick(1), "⠋");
/// assert_eq!(frame_for_tick(2), "⠙");
/// ```
pub fn frame_for_tick(tick: u64) -> &'static str {
    let index = (tick / TICKS_PER_FRAME) % frame_count() as u64;
    let start = index as usize * FRAME_BYTES;
    FRAMES.get(start..start + FRAME_BYTES).unwrap_or(" ")
}

/// The same frames for indicatif's `tick_chars`.
pub fn tick_chars() -> &'static str {
    FRAMES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_are_single_characters() {
        assert_eq!(frame_count(), FRAMES.chars().count());
        for tick in 0..(frame_count() as u64 * TICKS_PER_FRAME) {
            assert_eq!(frame_for_tick(tick).chars().count(), 1);
        }
    }

    #[test]
    fn test_dashboard_cycle_wraps_to_first_frame() {
        let cycle = frame_count() as u64 * TICKS_PER_FRAME;
        assert_eq!(frame_for_tick(cycle), frame_for_tick(0));
        assert_ne!(frame_for_tick(cycle - 1), frame_for_tick(0));
    }

    #[test]
    fn test_cli_and_dashboard_share_frames() {
        let dashboard: String = (0..frame_count() as u64)
            .map(|i| frame_for_tick(i * TICKS_PER_FRAME))
            .collect();
        assert_eq!(dashboard, tick_chars());
    }
}
