//! The device's grouped configuration schema.
//!
//! The firmware stores its settings as four groups.  On the wire the
//! configuration is a nested JSON object:
//!
//! ```json
//! {
//!   "motor":     {"min_width": 1000, "max_width": 4000, "ramp_length": 100},
//!   "camera":    {"shutter_duration": 1000, "focus_duration": 1000},
//!   "stack":     {"stack_count": 5, "delay_after_photo": 200,
//!                 "delay_before_photo": 1000, "move_steps": 200},
//!   "interface": {"status_interval": 100, "ui_transmission_ratio": 1.0,
//!                 "buzzer_frequency": 0, "buzzer_duration": 0}
//! }
//! ```
//!
//! Durations and delays are in milliseconds.  Motor widths are pulse widths
//! in microseconds; a smaller width means a faster motor.

use serde::{Deserialize, Serialize};

/// Complete device configuration, grouped by subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NestedConfig {
    pub motor: MotorConfig,
    pub camera: CameraConfig,
    pub stack: StackConfig,
    pub interface: InterfaceConfig,
}

/// Stepper motor timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorConfig {
    /// Fastest pulse width, reached at the end of the ramp.
    pub min_width: i64,
    /// Slowest pulse width, used at the start of the ramp.
    pub max_width: i64,
    /// Number of steps over which the motor ramps from max to min width.
    pub ramp_length: i64,
}

/// Camera trigger timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// How long the shutter line is held after focusing.
    pub shutter_duration: i64,
    /// How long the focus line is held before the shutter is pressed.
    pub focus_duration: i64,
}

/// Parameters of one stacking run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackConfig {
    /// Number of photos (and movements) in the stack.
    pub stack_count: i64,
    pub delay_after_photo: i64,
    pub delay_before_photo: i64,
    /// Motor steps per stack step; negative values move the other way.
    pub move_steps: i64,
}

/// Device-side interface settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Interval between unsolicited status reports.
    pub status_interval: i64,
    /// Motor steps per degree of rotation, stored on the device for the UI.
    pub ui_transmission_ratio: f64,
    pub buzzer_frequency: i64,
    pub buzzer_duration: i64,
}

// ── Firmware defaults ─────────────────────────────────────────────────────────

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            min_width: 1000,
            max_width: 4000,
            ramp_length: 100,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            shutter_duration: 1000,
            focus_duration: 1000,
        }
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            stack_count: 5,
            delay_after_photo: 200,
            delay_before_photo: 1000,
            move_steps: 200,
        }
    }
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            status_interval: 100,
            ui_transmission_ratio: 1.0,
            buzzer_frequency: 0,
            buzzer_duration: 0,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
