//! Flat ↔ nested configuration transcoder.
//!
//! The operator-facing side works with a single-level map whose keys are
//! namespaced `"<group>_<field>"`; the device expects the grouped
//! [`NestedConfig`].  [`ConfigField`] is the one place that knows the
//! correspondence between the two:
//!
//! | Flat key                          | Nested path                       |
//! |-----------------------------------|-----------------------------------|
//! | `motor_min_width`                 | `motor.min_width`                 |
//! | `motor_max_width`                 | `motor.max_width`                 |
//! | `motor_ramp_length`               | `motor.ramp_length`               |
//! | `camera_shutter_duration`         | `camera.shutter_duration`         |
//! | `camera_focus_duration`           | `camera.focus_duration`           |
//! | `stack_stack_count`               | `stack.stack_count`               |
//! | `stack_delay_after_photo`         | `stack.delay_after_photo`         |
//! | `stack_delay_before_photo`        | `stack.delay_before_photo`        |
//! | `stack_move_steps`                | `stack.move_steps`                |
//! | `interface_status_interval`       | `interface.status_interval`       |
//! | `interface_ui_transmission_ratio` | `interface.ui_transmission_ratio` |
//! | `interface_buzzer_frequency`      | `interface.buzzer_frequency`      |
//! | `interface_buzzer_duration`       | `interface.buzzer_duration`       |
//!
//! Keys outside this table (such as the UI-only `ui_stack_move_degrees`) are
//! ignored by [`unflatten`] and never produced by [`flatten`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::nested::NestedConfig;

/// Errors raised while converting or validating configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A value violates a precondition of a derived computation
    /// (e.g. a zero transmission ratio).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A key of the correspondence table is absent from the flat config.
    #[error("missing configuration field `{0}`")]
    MissingField(&'static str),

    /// A value cannot be stored in the field it was assigned to.
    #[error("field `{key}` expects {expected}, got {value}")]
    TypeMismatch {
        key: &'static str,
        expected: &'static str,
        value: Scalar,
    },

    /// A key that is neither a table key nor a known UI key.
    #[error("unknown configuration key `{0}`")]
    UnknownKey(String),

    /// Text that does not parse as a number.
    #[error("`{0}` is not a number")]
    InvalidNumber(String),
}

// ── Scalar ────────────────────────────────────────────────────────────────────

/// A single configuration value: integer or floating point.
///
/// Serialized untagged so that it reads and writes as a plain JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
}

impl Scalar {
    /// Returns the value as `f64`.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Int(v) => v as f64,
            Scalar::Float(v) => v,
        }
    }

    /// Returns the value as an integer if it has no fractional part.
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_int(self) -> Option<i64> {
        match self {
            Scalar::Int(v) => Some(v),
            Scalar::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15 => {
                Some(v as i64)
            }
            Scalar::Float(_) => None,
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
        }
    }
}

impl FromStr for Scalar {
    type Err = ConfigError;

    /// Integers parse as [`Scalar::Int`], anything else numeric as [`Scalar::Float`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(v) = trimmed.parse::<i64>() {
            return Ok(Scalar::Int(v));
        }
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Scalar::Float)
            .ok_or_else(|| ConfigError::InvalidNumber(s.to_string()))
    }
}

/// UI-facing configuration: flat key → scalar.
pub type FlatConfig = BTreeMap<String, Scalar>;

// ── Correspondence table ──────────────────────────────────────────────────────

/// Expected value type of a configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Integer,
    Float,
}

/// One row of the flat ↔ nested correspondence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigField {
    MotorMinWidth,
    MotorMaxWidth,
    MotorRampLength,
    CameraShutterDuration,
    CameraFocusDuration,
    StackStackCount,
    StackDelayAfterPhoto,
    StackDelayBeforePhoto,
    StackMoveSteps,
    InterfaceStatusInterval,
    InterfaceUiTransmissionRatio,
    InterfaceBuzzerFrequency,
    InterfaceBuzzerDuration,
}

impl ConfigField {
    /// Every row of the table, in wire order.
    pub const ALL: [ConfigField; 13] = [
        ConfigField::MotorMinWidth,
        ConfigField::MotorMaxWidth,
        ConfigField::MotorRampLength,
        ConfigField::CameraShutterDuration,
        ConfigField::CameraFocusDuration,
        ConfigField::StackStackCount,
        ConfigField::StackDelayAfterPhoto,
        ConfigField::StackDelayBeforePhoto,
        ConfigField::StackMoveSteps,
        ConfigField::InterfaceStatusInterval,
        ConfigField::InterfaceUiTransmissionRatio,
        ConfigField::InterfaceBuzzerFrequency,
        ConfigField::InterfaceBuzzerDuration,
    ];

    /// The flat (UI) key of this field.
    pub fn flat_key(self) -> &'static str {
        match self {
            ConfigField::MotorMinWidth => "motor_min_width",
            ConfigField::MotorMaxWidth => "motor_max_width",
            ConfigField::MotorRampLength => "motor_ramp_length",
            ConfigField::CameraShutterDuration => "camera_shutter_duration",
            ConfigField::CameraFocusDuration => "camera_focus_duration",
            ConfigField::StackStackCount => "stack_stack_count",
            ConfigField::StackDelayAfterPhoto => "stack_delay_after_photo",
            ConfigField::StackDelayBeforePhoto => "stack_delay_before_photo",
            ConfigField::StackMoveSteps => "stack_move_steps",
            ConfigField::InterfaceStatusInterval => "interface_status_interval",
            ConfigField::InterfaceUiTransmissionRatio => "interface_ui_transmission_ratio",
            ConfigField::InterfaceBuzzerFrequency => "interface_buzzer_frequency",
            ConfigField::InterfaceBuzzerDuration => "interface_buzzer_duration",
        }
    }

    /// The `(group, field)` path of this field in the nested schema.
    pub fn nested_path(self) -> (&'static str, &'static str) {
        match self {
            ConfigField::MotorMinWidth => ("motor", "min_width"),
            ConfigField::MotorMaxWidth => ("motor", "max_width"),
            ConfigField::MotorRampLength => ("motor", "ramp_length"),
            ConfigField::CameraShutterDuration => ("camera", "shutter_duration"),
            ConfigField::CameraFocusDuration => ("camera", "focus_duration"),
            ConfigField::StackStackCount => ("stack", "stack_count"),
            ConfigField::StackDelayAfterPhoto => ("stack", "delay_after_photo"),
            ConfigField::StackDelayBeforePhoto => ("stack", "delay_before_photo"),
            ConfigField::StackMoveSteps => ("stack", "move_steps"),
            ConfigField::InterfaceStatusInterval => ("interface", "status_interval"),
            ConfigField::InterfaceUiTransmissionRatio => ("interface", "ui_transmission_ratio"),
            ConfigField::InterfaceBuzzerFrequency => ("interface", "buzzer_frequency"),
            ConfigField::InterfaceBuzzerDuration => ("interface", "buzzer_duration"),
        }
    }

    /// Looks up a field by its flat key.
    pub fn from_flat_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.flat_key() == key)
    }

    /// The value type the device stores for this field.
    pub fn kind(self) -> ScalarKind {
        match self {
            ConfigField::InterfaceUiTransmissionRatio => ScalarKind::Float,
            _ => ScalarKind::Integer,
        }
    }

    /// Reads this field out of a nested config.
    pub fn read(self, cfg: &NestedConfig) -> Scalar {
        match self {
            ConfigField::MotorMinWidth => cfg.motor.min_width.into(),
            ConfigField::MotorMaxWidth => cfg.motor.max_width.into(),
            ConfigField::MotorRampLength => cfg.motor.ramp_length.into(),
            ConfigField::CameraShutterDuration => cfg.camera.shutter_duration.into(),
            ConfigField::CameraFocusDuration => cfg.camera.focus_duration.into(),
            ConfigField::StackStackCount => cfg.stack.stack_count.into(),
            ConfigField::StackDelayAfterPhoto => cfg.stack.delay_after_photo.into(),
            ConfigField::StackDelayBeforePhoto => cfg.stack.delay_before_photo.into(),
            ConfigField::StackMoveSteps => cfg.stack.move_steps.into(),
            ConfigField::InterfaceStatusInterval => cfg.interface.status_interval.into(),
            ConfigField::InterfaceUiTransmissionRatio => {
                cfg.interface.ui_transmission_ratio.into()
            }
            ConfigField::InterfaceBuzzerFrequency => cfg.interface.buzzer_frequency.into(),
            ConfigField::InterfaceBuzzerDuration => cfg.interface.buzzer_duration.into(),
        }
    }

    /// Stores `value` into this field of a nested config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TypeMismatch`] when a value with a fractional
    /// part is assigned to an integer field.
    pub fn write(self, cfg: &mut NestedConfig, value: Scalar) -> Result<(), ConfigError> {
        match self {
            ConfigField::MotorMinWidth => cfg.motor.min_width = self.integer(value)?,
            ConfigField::MotorMaxWidth => cfg.motor.max_width = self.integer(value)?,
            ConfigField::MotorRampLength => cfg.motor.ramp_length = self.integer(value)?,
            ConfigField::CameraShutterDuration => {
                cfg.camera.shutter_duration = self.integer(value)?;
            }
            ConfigField::CameraFocusDuration => cfg.camera.focus_duration = self.integer(value)?,
            ConfigField::StackStackCount => cfg.stack.stack_count = self.integer(value)?,
            ConfigField::StackDelayAfterPhoto => {
                cfg.stack.delay_after_photo = self.integer(value)?;
            }
            ConfigField::StackDelayBeforePhoto => {
                cfg.stack.delay_before_photo = self.integer(value)?;
            }
            ConfigField::StackMoveSteps => cfg.stack.move_steps = self.integer(value)?,
            ConfigField::InterfaceStatusInterval => {
                cfg.interface.status_interval = self.integer(value)?;
            }
            ConfigField::InterfaceUiTransmissionRatio => {
                cfg.interface.ui_transmission_ratio = value.as_f64();
            }
            ConfigField::InterfaceBuzzerFrequency => {
                cfg.interface.buzzer_frequency = self.integer(value)?;
            }
            ConfigField::InterfaceBuzzerDuration => {
                cfg.interface.buzzer_duration = self.integer(value)?;
            }
        }
        Ok(())
    }

    fn integer(self, value: Scalar) -> Result<i64, ConfigError> {
        value.as_int().ok_or(ConfigError::TypeMismatch {
            key: self.flat_key(),
            expected: "an integer",
            value,
        })
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Projects a nested device config onto the flat key space.
///
/// Total: every table field is emitted exactly once.
///
/// # Examples
///
/// ```rust
/// use stacker_core::config::{flatten, NestedConfig, Scalar};
///
/// let flat = flatten(&NestedConfig::default());
/// assert_eq!(flat["motor_min_width"], Scalar::Int(1000));
/// assert_eq!(flat.len(), 13);
/// ```
pub fn flatten(nested: &NestedConfig) -> FlatConfig {
    ConfigField::ALL
        .into_iter()
        .map(|field| (field.flat_key().to_string(), field.read(nested)))
        .collect()
}

/// Rebuilds the nested device config from flat keys.
///
/// Keys outside the correspondence table are ignored.
///
/// # Errors
///
/// Returns [`ConfigError::MissingField`] if any table key is absent, or
/// [`ConfigError::TypeMismatch`] if a value does not fit its field.
pub fn unflatten(flat: &FlatConfig) -> Result<NestedConfig, ConfigError> {
    let mut nested = NestedConfig::default();
    for field in ConfigField::ALL {
        let value = flat
            .get(field.flat_key())
            .copied()
            .ok_or(ConfigError::MissingField(field.flat_key()))?;
        field.write(&mut nested, value)?;
    }
    Ok(nested)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::nested::{CameraConfig, InterfaceConfig, MotorConfig, StackConfig};

    fn sample_config() -> NestedConfig {
        NestedConfig {
            motor: MotorConfig {
                min_width: 500,
                max_width: 4000,
                ramp_length: 100,
            },
            camera: CameraConfig {
                shutter_duration: 500,
                focus_duration: 750,
            },
            stack: StackConfig {
                stack_count: 5,
                delay_after_photo: 1000,
                delay_before_photo: 1200,
                move_steps: -100,
            },
            interface: InterfaceConfig {
                status_interval: 100,
                ui_transmission_ratio: 2.5,
                buzzer_frequency: 880,
                buzzer_duration: 30,
            },
        }
    }

    #[test]
    fn test_flatten_emits_every_table_key() {
        // Arrange
        let cfg = sample_config();

        // Act
        let flat = flatten(&cfg);

        // Assert
        assert_eq!(flat.len(), ConfigField::ALL.len());
        for field in ConfigField::ALL {
            assert!(flat.contains_key(field.flat_key()), "{}", field.flat_key());
        }
    }

    #[test]
    fn test_flatten_maps_values_to_flat_keys() {
        let flat = flatten(&sample_config());
        assert_eq!(flat["camera_focus_duration"], Scalar::Int(750));
        assert_eq!(flat["stack_move_steps"], Scalar::Int(-100));
        assert_eq!(flat["interface_ui_transmission_ratio"], Scalar::Float(2.5));
        assert_eq!(flat["interface_buzzer_frequency"], Scalar::Int(880));
    }

    #[test]
    fn test_unflatten_inverts_flatten() {
        // Arrange
        let cfg = sample_config();

        // Act
        let restored = unflatten(&flatten(&cfg)).unwrap();

        // Assert
        assert_eq!(restored, cfg);
    }

    #[test]
    fn test_unflatten_ignores_keys_outside_table() {
        let mut flat = flatten(&sample_config());
        flat.insert("ui_stack_move_degrees".to_string(), Scalar::Int(45));
        assert_eq!(unflatten(&flat).unwrap(), sample_config());
    }

    #[test]
    fn test_unflatten_missing_field_is_error() {
        // Arrange
        let mut flat = flatten(&sample_config());
        flat.remove("stack_delay_before_photo");

        // Act
        let result = unflatten(&flat);

        // Assert
        assert_eq!(
            result,
            Err(ConfigError::MissingField("stack_delay_before_photo"))
        );
    }

    #[test]
    fn test_unflatten_rejects_fraction_in_integer_field() {
        let mut flat = flatten(&sample_config());
        flat.insert("motor_ramp_length".to_string(), Scalar::Float(10.5));
        assert!(matches!(
            unflatten(&flat),
            Err(ConfigError::TypeMismatch {
                key: "motor_ramp_length",
                ..
            })
        ));
    }

    #[test]
    fn test_unflatten_accepts_integral_float_in_integer_field() {
        let mut flat = flatten(&sample_config());
        flat.insert("stack_stack_count".to_string(), Scalar::Float(7.0));
        assert_eq!(unflatten(&flat).unwrap().stack.stack_count, 7);
    }

    #[test]
    fn test_integer_ratio_is_widened_to_float() {
        let mut flat = flatten(&sample_config());
        flat.insert("interface_ui_transmission_ratio".to_string(), Scalar::Int(3));
        let cfg = unflatten(&flat).unwrap();
        assert_eq!(cfg.interface.ui_transmission_ratio, 3.0);
    }

    #[test]
    fn test_nested_path_matches_serialized_layout() {
        // Every nested path in the table must address the field the serde
        // layout produces for the same value.
        let cfg = sample_config();
        let value = serde_json::to_value(&cfg).unwrap();
        for field in ConfigField::ALL {
            let (group, name) = field.nested_path();
            let wire = &value[group][name];
            assert_eq!(wire.as_f64().unwrap(), field.read(&cfg).as_f64(), "{group}.{name}");
        }
    }

    #[test]
    fn test_flat_key_is_group_and_field_joined() {
        for field in ConfigField::ALL {
            let (group, name) = field.nested_path();
            assert_eq!(field.flat_key(), format!("{group}_{name}"));
        }
    }

    #[test]
    fn test_from_flat_key_finds_every_field() {
        for field in ConfigField::ALL {
            assert_eq!(ConfigField::from_flat_key(field.flat_key()), Some(field));
        }
        assert_eq!(ConfigField::from_flat_key("ui_stack_move_degrees"), None);
    }

    #[test]
    fn test_scalar_parses_integers_and_floats() {
        assert_eq!("42".parse::<Scalar>().unwrap(), Scalar::Int(42));
        assert_eq!(" -7 ".parse::<Scalar>().unwrap(), Scalar::Int(-7));
        assert_eq!("1.5".parse::<Scalar>().unwrap(), Scalar::Float(1.5));
        assert!(matches!(
            "abc".parse::<Scalar>(),
            Err(ConfigError::InvalidNumber(_))
        ));
        assert!("NaN".parse::<Scalar>().is_err());
    }

    #[test]
    fn test_scalar_deserializes_from_plain_json_numbers() {
        let flat: FlatConfig =
            serde_json::from_str(r#"{"motor_min_width": 10, "interface_ui_transmission_ratio": 1.5}"#)
                .unwrap();
        assert_eq!(flat["motor_min_width"], Scalar::Int(10));
        assert_eq!(flat["interface_ui_transmission_ratio"], Scalar::Float(1.5));
    }
}
