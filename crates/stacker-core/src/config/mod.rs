//! Device configuration: the grouped schema, the flat transcoder, and the
//! operator-facing view with its derived values.

pub mod nested;
pub mod transcode;
pub mod ui;

pub use nested::{CameraConfig, InterfaceConfig, MotorConfig, NestedConfig, StackConfig};
pub use transcode::{
    flatten, unflatten, ConfigError, ConfigField, FlatConfig, Scalar, ScalarKind,
};
pub use ui::{
    clamp_status_interval, TransmissionRatio, UiConfig, FORM_FIELDS, MIN_STATUS_INTERVAL,
    STACK_MOVE_DEGREES_KEY, TRANSMISSION_RATIO_ALIAS,
};
