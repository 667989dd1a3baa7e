//! # stacker-core
//!
//! Shared library for the focus stacker bridge containing the wire envelope
//! codec, the typed device messages, the configuration transcoder, and the
//! operator-facing status rendering.
//!
//! It has no dependencies on sockets, timers, or an async runtime; the
//! `stacker-bridge` crate supplies those.
//!
//! # Architecture overview (for beginners)
//!
//! A focus stacker is a motorised rail that moves a camera in small steps and
//! takes one photo per step.  Its firmware talks over a serial port to a small
//! relay server, and the relay exposes a WebSocket.  The operator side (the
//! `stacker-bridge` binary) connects to that WebSocket.
//!
//! This crate defines what travels over the WebSocket and how the operator
//! side interprets it:
//!
//! - **`protocol`**: Every frame is a JSON array `[command_type, payload]`.
//!   Device messages use `command_type == "serial"` with a `msg_type` inside
//!   the payload.  The module decodes frames into typed [`InboundMessage`]s
//!   and encodes [`OutboundCommand`]s.
//!
//! - **`config`**: The device stores its settings grouped by subsystem
//!   ([`NestedConfig`]); the operator edits them as a flat list of
//!   `group_field` keys.  The transcoder converts between the two and derives
//!   motor steps from the rotation in degrees the operator enters.
//!
//! - **`view`**: Turns a status report into the status line, the current
//!   action, and the progress percentage shown to the operator.

pub mod config;
pub mod protocol;
pub mod view;

// Re-export the most-used types at the crate root so callers can write
// `stacker_core::NestedConfig` instead of `stacker_core::config::nested::NestedConfig`.
pub use config::{flatten, unflatten, ConfigError, FlatConfig, NestedConfig, Scalar, UiConfig};
pub use protocol::{
    DeviceStatus, Envelope, FirmwareVersion, InboundMessage, OutboundCommand, ProtocolError,
    SerialRequest,
};
pub use view::StatusView;
