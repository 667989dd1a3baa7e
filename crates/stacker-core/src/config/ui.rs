//! Operator-side view of the configuration and its derived values.
//!
//! [`UiConfig`] holds what the operator's form shows and edits: every flat
//! field of the device configuration plus the UI-only rotation value
//! `ui_stack_move_degrees`.  Two derived computations live here:
//!
//! - **Interval clamp**: `interface_status_interval` read from the form is
//!   raised to at least [`MIN_STATUS_INTERVAL`].  Lower values are never
//!   rejected.
//! - **Unit conversion**: the form edits rotation in degrees while the device
//!   moves in motor steps.  `stack_move_steps = round(degrees * ratio)` when
//!   reading the form and `degrees = round(stack_move_steps / ratio)` when a
//!   device config is loaded.
//!
//! The ratio is carried through [`TransmissionRatio`], which refuses zero and
//! non-finite values, so neither direction can produce a meaningless number.

use tracing::debug;

use super::nested::NestedConfig;
use super::transcode::{
    flatten, unflatten, ConfigError, ConfigField, FlatConfig, Scalar, ScalarKind,
};

/// Smallest accepted status report interval.
pub const MIN_STATUS_INTERVAL: i64 = 100;

/// UI-only key holding the stack movement in degrees.
pub const STACK_MOVE_DEGREES_KEY: &str = "ui_stack_move_degrees";

/// Short form key accepted for the transmission ratio field.
pub const TRANSMISSION_RATIO_ALIAS: &str = "ui_transmission_ratio";

/// Table fields the operator edits directly.
///
/// `stack_move_steps` is derived from degrees and the buzzer settings are
/// carried over from the device, so neither is editable here.
pub const FORM_FIELDS: [ConfigField; 10] = [
    ConfigField::MotorMinWidth,
    ConfigField::MotorMaxWidth,
    ConfigField::MotorRampLength,
    ConfigField::CameraShutterDuration,
    ConfigField::CameraFocusDuration,
    ConfigField::StackStackCount,
    ConfigField::StackDelayAfterPhoto,
    ConfigField::StackDelayBeforePhoto,
    ConfigField::InterfaceStatusInterval,
    ConfigField::InterfaceUiTransmissionRatio,
];

/// Raises `interval` to [`MIN_STATUS_INTERVAL`] if it is below it.
///
/// ```rust
/// use stacker_core::config::clamp_status_interval;
///
/// assert_eq!(clamp_status_interval(50), 100);
/// assert_eq!(clamp_status_interval(250), 250);
/// ```
pub fn clamp_status_interval(interval: i64) -> i64 {
    interval.max(MIN_STATUS_INTERVAL)
}

/// Rounds half-way values towards positive infinity.
#[allow(clippy::cast_possible_truncation)]
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

// ── TransmissionRatio ─────────────────────────────────────────────────────────

/// Motor steps per degree of rotation.  Always finite and non-zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransmissionRatio(f64);

impl TransmissionRatio {
    /// Validates `ratio`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] for zero, NaN, or
    /// infinite values.
    pub fn new(ratio: f64) -> Result<Self, ConfigError> {
        if ratio == 0.0 || !ratio.is_finite() {
            return Err(ConfigError::InvalidConfiguration(format!(
                "transmission ratio must be finite and non-zero, got {ratio}"
            )));
        }
        Ok(Self(ratio))
    }

    /// `round(degrees * ratio)`.
    ///
    /// ```rust
    /// use stacker_core::config::TransmissionRatio;
    ///
    /// let ratio = TransmissionRatio::new(2.0).unwrap();
    /// assert_eq!(ratio.degrees_to_steps(90), 180);
    /// ```
    #[allow(clippy::cast_precision_loss)]
    pub fn degrees_to_steps(self, degrees: i64) -> i64 {
        round_half_up(degrees as f64 * self.0)
    }

    /// `round(steps / ratio)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn steps_to_degrees(self, steps: i64) -> i64 {
        round_half_up(steps as f64 / self.0)
    }
}

// ── UiConfig ──────────────────────────────────────────────────────────────────

/// The configuration as the operator's form sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct UiConfig {
    /// Every field of the correspondence table, keyed by flat key.
    values: FlatConfig,
    /// Stack movement in degrees; the form's source for `stack_move_steps`.
    stack_move_degrees: i64,
}

impl Default for UiConfig {
    fn default() -> Self {
        let nested = NestedConfig::default();
        // Firmware defaults use a ratio of 1, so degrees equal steps.
        Self {
            stack_move_degrees: nested.stack.move_steps,
            values: flatten(&nested),
        }
    }
}

impl UiConfig {
    /// Builds the UI view of a device configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] if the device reports a
    /// zero transmission ratio.
    pub fn from_device_config(nested: &NestedConfig) -> Result<Self, ConfigError> {
        let mut ui = Self::default();
        ui.load_device_config(nested)?;
        Ok(ui)
    }

    /// Replaces the current values with a configuration read from the device
    /// and recomputes the displayed degrees from its motor steps.
    ///
    /// Leaves `self` untouched on error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] if the device reports a
    /// zero transmission ratio.
    pub fn load_device_config(&mut self, nested: &NestedConfig) -> Result<(), ConfigError> {
        let ratio = TransmissionRatio::new(nested.interface.ui_transmission_ratio)?;
        self.values = flatten(nested);
        self.stack_move_degrees = ratio.steps_to_degrees(nested.stack.move_steps);
        debug!(
            move_steps = nested.stack.move_steps,
            degrees = self.stack_move_degrees,
            "loaded device configuration"
        );
        Ok(())
    }

    /// Applies raw form fields.
    ///
    /// Accepts the keys of [`FORM_FIELDS`], [`STACK_MOVE_DEGREES_KEY`] and
    /// [`TRANSMISSION_RATIO_ALIAS`].  After the fields are applied the status
    /// interval is clamped and `stack_move_steps` is recomputed from degrees.
    /// The update is all-or-nothing: on error `self` is unchanged.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnknownKey`] for a key the form does not own.
    /// - [`ConfigError::TypeMismatch`] for a fractional value in an integer field.
    /// - [`ConfigError::InvalidConfiguration`] if the resulting ratio is zero.
    pub fn read_form(&mut self, form: &FlatConfig) -> Result<(), ConfigError> {
        let mut values = self.values.clone();
        let mut degrees = self.stack_move_degrees;

        for (key, &value) in form {
            if key == STACK_MOVE_DEGREES_KEY {
                degrees = value.as_int().ok_or(ConfigError::TypeMismatch {
                    key: STACK_MOVE_DEGREES_KEY,
                    expected: "an integer",
                    value,
                })?;
                continue;
            }

            let field = Self::form_field(key)?;
            let stored = match field.kind() {
                ScalarKind::Float => Scalar::Float(value.as_f64()),
                ScalarKind::Integer => {
                    Scalar::Int(value.as_int().ok_or(ConfigError::TypeMismatch {
                        key: field.flat_key(),
                        expected: "an integer",
                        value,
                    })?)
                }
            };
            values.insert(field.flat_key().to_string(), stored);
        }

        let interval_key = ConfigField::InterfaceStatusInterval.flat_key();
        if let Some(interval) = values.get(interval_key).and_then(|v| v.as_int()) {
            values.insert(
                interval_key.to_string(),
                Scalar::Int(clamp_status_interval(interval)),
            );
        }

        let ratio = Self::ratio_of(&values)?;
        values.insert(
            ConfigField::StackMoveSteps.flat_key().to_string(),
            Scalar::Int(ratio.degrees_to_steps(degrees)),
        );

        self.values = values;
        self.stack_move_degrees = degrees;
        Ok(())
    }

    /// Builds the nested configuration to upload to the device.
    ///
    /// # Errors
    ///
    /// Propagates [`unflatten`] failures.
    pub fn to_device_config(&self) -> Result<NestedConfig, ConfigError> {
        unflatten(&self.values)
    }

    /// The values the form displays, keyed as [`read_form`](Self::read_form)
    /// accepts them.
    pub fn form_values(&self) -> FlatConfig {
        let mut form: FlatConfig = FORM_FIELDS
            .iter()
            .filter_map(|field| {
                self.values
                    .get(field.flat_key())
                    .map(|v| (field.flat_key().to_string(), *v))
            })
            .collect();
        form.insert(
            STACK_MOVE_DEGREES_KEY.to_string(),
            Scalar::Int(self.stack_move_degrees),
        );
        form
    }

    /// Returns `true` when an edited form value differs from the current one,
    /// i.e. the edit has not been uploaded yet.
    pub fn is_pending(&self, key: &str, edited: Scalar) -> bool {
        let current = if key == STACK_MOVE_DEGREES_KEY {
            Some(Scalar::Int(self.stack_move_degrees))
        } else {
            Self::form_field(key)
                .ok()
                .and_then(|field| self.values.get(field.flat_key()).copied())
        };
        current.map_or(true, |current| current.as_f64() != edited.as_f64())
    }

    /// All table fields, keyed by flat key.
    pub fn values(&self) -> &FlatConfig {
        &self.values
    }

    pub fn stack_move_degrees(&self) -> i64 {
        self.stack_move_degrees
    }

    /// Current `stack_move_steps`.
    pub fn stack_move_steps(&self) -> i64 {
        self.values
            .get(ConfigField::StackMoveSteps.flat_key())
            .and_then(|v| v.as_int())
            .unwrap_or_default()
    }

    fn form_field(key: &str) -> Result<ConfigField, ConfigError> {
        let field = if key == TRANSMISSION_RATIO_ALIAS {
            Some(ConfigField::InterfaceUiTransmissionRatio)
        } else {
            ConfigField::from_flat_key(key)
        };
        field
            .filter(|field| FORM_FIELDS.contains(field))
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))
    }

    fn ratio_of(values: &FlatConfig) -> Result<TransmissionRatio, ConfigError> {
        let key = ConfigField::InterfaceUiTransmissionRatio.flat_key();
        let ratio = values
            .get(key)
            .copied()
            .ok_or(ConfigError::MissingField(key))?;
        TransmissionRatio::new(ratio.as_f64())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn form(entries: &[(&str, Scalar)]) -> FlatConfig {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), *v))
            .collect()
    }

    fn status_interval(ui: &UiConfig) -> Scalar {
        ui.values()[ConfigField::InterfaceStatusInterval.flat_key()]
    }

    #[test]
    fn test_status_interval_below_minimum_is_raised() {
        // Arrange
        let mut ui = UiConfig::default();

        // Act
        ui.read_form(&form(&[("interface_status_interval", Scalar::Int(50))]))
            .unwrap();

        // Assert
        assert_eq!(status_interval(&ui), Scalar::Int(100));
    }

    #[test]
    fn test_status_interval_above_minimum_is_kept() {
        let mut ui = UiConfig::default();
        ui.read_form(&form(&[("interface_status_interval", Scalar::Int(250))]))
            .unwrap();
        assert_eq!(status_interval(&ui), Scalar::Int(250));
    }

    #[test]
    fn test_degrees_convert_to_steps_on_read() {
        // Arrange
        let mut ui = UiConfig::default();

        // Act
        ui.read_form(&form(&[
            (STACK_MOVE_DEGREES_KEY, Scalar::Int(90)),
            (TRANSMISSION_RATIO_ALIAS, Scalar::Int(2)),
        ]))
        .unwrap();

        // Assert
        assert_eq!(ui.stack_move_steps(), 180);
        assert_eq!(ui.to_device_config().unwrap().stack.move_steps, 180);
    }

    #[test]
    fn test_steps_convert_to_degrees_on_load() {
        // Arrange
        let mut nested = NestedConfig::default();
        nested.stack.move_steps = 180;
        nested.interface.ui_transmission_ratio = 2.0;

        // Act
        let ui = UiConfig::from_device_config(&nested).unwrap();

        // Assert
        assert_eq!(ui.stack_move_degrees(), 90);
    }

    #[test]
    fn test_conversion_rounds_half_up() {
        let ratio = TransmissionRatio::new(0.5).unwrap();
        assert_eq!(ratio.degrees_to_steps(5), 3);
        assert_eq!(ratio.degrees_to_steps(-5), -2);
        assert_eq!(TransmissionRatio::new(3.0).unwrap().steps_to_degrees(10), 3);
    }

    #[test]
    fn test_zero_ratio_is_rejected() {
        assert!(matches!(
            TransmissionRatio::new(0.0),
            Err(ConfigError::InvalidConfiguration(_))
        ));
        assert!(TransmissionRatio::new(f64::NAN).is_err());
        assert!(TransmissionRatio::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_read_form_with_zero_ratio_fails_and_leaves_state() {
        // Arrange
        let mut ui = UiConfig::default();
        let before = ui.clone();

        // Act
        let result = ui.read_form(&form(&[
            ("motor_min_width", Scalar::Int(1)),
            ("interface_ui_transmission_ratio", Scalar::Float(0.0)),
        ]));

        // Assert
        assert!(matches!(result, Err(ConfigError::InvalidConfiguration(_))));
        assert_eq!(ui, before);
    }

    #[test]
    fn test_load_device_config_with_zero_ratio_fails() {
        let mut nested = NestedConfig::default();
        nested.interface.ui_transmission_ratio = 0.0;
        let mut ui = UiConfig::default();
        assert!(ui.load_device_config(&nested).is_err());
        assert_eq!(ui, UiConfig::default());
    }

    #[test]
    fn test_read_form_rejects_derived_and_device_owned_keys() {
        let mut ui = UiConfig::default();
        for key in ["stack_move_steps", "interface_buzzer_frequency", "bogus"] {
            let result = ui.read_form(&form(&[(key, Scalar::Int(1))]));
            assert_eq!(result, Err(ConfigError::UnknownKey(key.to_string())));
        }
    }

    #[test]
    fn test_read_form_rejects_fractional_integer_field() {
        let mut ui = UiConfig::default();
        let result = ui.read_form(&form(&[("camera_focus_duration", Scalar::Float(1.5))]));
        assert!(matches!(result, Err(ConfigError::TypeMismatch { .. })));
    }

    #[test]
    fn test_buzzer_fields_survive_form_edits() {
        // Arrange
        let mut nested = NestedConfig::default();
        nested.interface.buzzer_frequency = 2000;
        nested.interface.buzzer_duration = 15;
        let mut ui = UiConfig::from_device_config(&nested).unwrap();

        // Act
        ui.read_form(&form(&[("stack_stack_count", Scalar::Int(9))]))
            .unwrap();
        let upload = ui.to_device_config().unwrap();

        // Assert
        assert_eq!(upload.interface.buzzer_frequency, 2000);
        assert_eq!(upload.interface.buzzer_duration, 15);
        assert_eq!(upload.stack.stack_count, 9);
    }

    #[test]
    fn test_form_values_round_trip_through_read_form() {
        // Arrange
        let mut nested = NestedConfig::default();
        nested.stack.move_steps = 300;
        nested.interface.ui_transmission_ratio = 3.0;
        nested.interface.status_interval = 400;
        let mut ui = UiConfig::from_device_config(&nested).unwrap();
        let shown = ui.form_values();

        // Act
        ui.read_form(&shown).unwrap();

        // Assert
        assert_eq!(ui.to_device_config().unwrap(), nested);
    }

    #[test]
    fn test_is_pending_compares_against_current_value() {
        let ui = UiConfig::default();
        assert!(!ui.is_pending("motor_max_width", Scalar::Int(4000)));
        assert!(ui.is_pending("motor_max_width", Scalar::Int(3999)));
        assert!(!ui.is_pending(STACK_MOVE_DEGREES_KEY, Scalar::Float(200.0)));
        assert!(ui.is_pending("not_a_field", Scalar::Int(0)));
    }
}
