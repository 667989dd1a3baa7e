//! Operator-facing rendering of device state.
//!
//! [`StatusView`] turns a [`DeviceStatus`] into the texts and flags the
//! operator sees:
//!
//! | `state`        | Operation text                                        | Action shown     |
//! |----------------|-------------------------------------------------------|------------------|
//! | halted         | `Done stacking: N` if finished, else `Ready for operation` | no          |
//! | should_pause   | `Performing action.` unless in a pause sub-state       | unless paused   |
//! | running        | `Stacking: {step-1} / {count}`                         | yes              |
//!
//! The progress bar only moves while running; in other states the previous
//! percentage stays on screen, which is why [`StatusView::progress_percent`]
//! is an `Option`.

use std::fmt;

use crate::protocol::{DeviceStatus, StackState};

pub const READY_TEXT: &str = "Ready for operation";
pub const PERFORMING_TEXT: &str = "Performing action.";

/// What the operator sees for one status report.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusView {
    /// Main status line.
    pub operation_text: String,
    /// `Current action: <sub_state>` or empty.
    pub action_text: String,
    /// New progress bar width in percent, or `None` to leave it unchanged.
    pub progress_percent: Option<f64>,
    /// Whether a new stacking run may be started.
    pub start_enabled: bool,
    /// Whether the progress bar is animated.
    pub progress_active: bool,
    /// Whether the progress bar shows the finished style.
    pub finished: bool,
}

impl StatusView {
    pub fn from_status(status: &DeviceStatus) -> Self {
        let (operation_text, show_action, progress_percent) = match status.state {
            StackState::Halted if status.is_stack_finished => {
                (format!("Done stacking: {}", status.stack_count), false, None)
            }
            StackState::Halted => (READY_TEXT.to_string(), false, None),
            StackState::ShouldPause if status.sub_state.is_pause() => {
                (READY_TEXT.to_string(), false, None)
            }
            StackState::ShouldPause => (PERFORMING_TEXT.to_string(), true, None),
            StackState::Running => {
                let done = status.current_step.saturating_sub(1);
                (
                    format!("Stacking: {done} / {}", status.stack_count),
                    true,
                    Some(progress(done, status.stack_count)),
                )
            }
        };

        let action_text = if show_action {
            format!("Current action: {}", status.sub_state)
        } else {
            String::new()
        };

        Self {
            operation_text,
            action_text,
            progress_percent,
            start_enabled: status.is_idle,
            progress_active: !status.is_idle,
            finished: status.is_stack_finished,
        }
    }
}

impl fmt::Display for StatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.operation_text)?;
        if let Some(percent) = self.progress_percent {
            write!(f, " [{percent:.0}%]")?;
        }
        if !self.action_text.is_empty() {
            write!(f, " | {}", self.action_text)?;
        }
        Ok(())
    }
}

/// `done / (count - 1)` as a percentage.
///
/// A stack of one photo has no intermediate steps; it reads 0 % until its
/// only step is done and 100 % afterwards.
fn progress(done: u32, stack_count: u32) -> f64 {
    if stack_count <= 1 {
        return if done > 0 { 100.0 } else { 0.0 };
    }
    f64::from(done) / f64::from(stack_count - 1) * 100.0
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SubState;

    fn status(state: StackState, sub_state: SubState) -> DeviceStatus {
        DeviceStatus {
            state,
            sub_state,
            current_step: 3,
            stack_count: 5,
            is_stack_finished: false,
            is_idle: false,
        }
    }

    #[test]
    fn test_running_shows_completed_steps_and_progress() {
        // Arrange
        let s = status(StackState::Running, SubState::Movement);

        // Act
        let view = StatusView::from_status(&s);

        // Assert
        assert_eq!(view.operation_text, "Stacking: 2 / 5");
        assert_eq!(view.progress_percent, Some(50.0));
        assert_eq!(view.action_text, "Current action: movement");
        assert!(!view.start_enabled);
        assert!(view.progress_active);
    }

    #[test]
    fn test_halted_finished_reports_count() {
        let mut s = status(StackState::Halted, SubState::NextStep);
        s.is_stack_finished = true;
        s.is_idle = true;

        let view = StatusView::from_status(&s);

        assert_eq!(view.operation_text, "Done stacking: 5");
        assert_eq!(view.action_text, "");
        assert_eq!(view.progress_percent, None);
        assert!(view.start_enabled);
        assert!(view.finished);
    }

    #[test]
    fn test_halted_unfinished_is_ready() {
        let view = StatusView::from_status(&status(StackState::Halted, SubState::StartPhoto));
        assert_eq!(view.operation_text, READY_TEXT);
        assert_eq!(view.action_text, "");
    }

    #[test]
    fn test_should_pause_in_action_shows_sub_state() {
        let view = StatusView::from_status(&status(StackState::ShouldPause, SubState::PhotoBusy));
        assert_eq!(view.operation_text, PERFORMING_TEXT);
        assert_eq!(view.action_text, "Current action: photo_busy");
    }

    #[test]
    fn test_should_pause_in_pause_sub_state_is_ready() {
        for sub_state in [
            SubState::PauseAfterPhoto,
            SubState::DelayAfterPhoto,
            SubState::PauseAfterMovement,
        ] {
            let view = StatusView::from_status(&status(StackState::ShouldPause, sub_state));
            assert_eq!(view.operation_text, READY_TEXT);
            assert_eq!(view.action_text, "");
        }
    }

    #[test]
    fn test_single_photo_stack_does_not_divide_by_zero() {
        let mut s = status(StackState::Running, SubState::StartPhoto);
        s.stack_count = 1;
        s.current_step = 1;
        assert_eq!(StatusView::from_status(&s).progress_percent, Some(0.0));

        s.current_step = 2;
        assert_eq!(StatusView::from_status(&s).progress_percent, Some(100.0));
    }

    #[test]
    fn test_step_zero_does_not_underflow() {
        let mut s = status(StackState::Running, SubState::StartDelayBeforePhoto);
        s.current_step = 0;
        assert_eq!(StatusView::from_status(&s).operation_text, "Stacking: 0 / 5");
    }

    #[test]
    fn test_display_joins_parts() {
        let view = StatusView::from_status(&status(StackState::Running, SubState::Movement));
        assert_eq!(
            view.to_string(),
            "Stacking: 2 / 5 [50%] | Current action: movement"
        );
    }
}
