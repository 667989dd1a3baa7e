//! Inbound messages from the relay and the device.
//!
//! The relay answers in the same `[command_type, payload]` envelope.  After
//! the `serial` sub-protocol is collapsed into an effective key (see
//! [`super::envelope`]) the messages this side understands are:
//!
//! | Effective key        | Payload                                            |
//! |----------------------|----------------------------------------------------|
//! | `no_serial`          | ignored                                            |
//! | `connect_fail`       | `{"device": "<port>"}`                             |
//! | `connect_success`    | ignored                                            |
//! | `serial_get_status`  | `{"status": {"stack": {...}}}` → [`DeviceStatus`]  |
//! | `serial_get_version` | `{"version": {...}}` → [`FirmwareVersion`]         |
//! | `serial_get_config`  | `{"config": {...}}` → [`NestedConfig`]             |
//!
//! # State machine (for readers new to the firmware)
//!
//! A stacking run walks the device through `current_state` values
//! (halted → running → halted) and, inside each step of the stack, through
//! the eleven `current_sub_state` values listed in [`SubState`].  The
//! `should_pause` state is used for one-shot actions such as a single photo
//! or a manual motor move.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use super::envelope::{Envelope, ProtocolError};
use crate::config::NestedConfig;

// ── Stack state ───────────────────────────────────────────────────────────────

/// Top-level device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StackState {
    Halted = 0,
    ShouldPause = 1,
    Running = 2,
}

impl TryFrom<u8> for StackState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(StackState::Halted),
            1 => Ok(StackState::ShouldPause),
            2 => Ok(StackState::Running),
            other => Err(other),
        }
    }
}

/// Step inside one stack iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SubState {
    StartDelayBeforePhoto = 0,
    DelayBeforePhoto = 1,
    StartPhoto = 2,
    PhotoBusy = 3,
    PauseAfterPhoto = 4,
    StartDelayAfterPhoto = 5,
    DelayAfterPhoto = 6,
    StartMovement = 7,
    Movement = 8,
    PauseAfterMovement = 9,
    NextStep = 10,
}

impl SubState {
    /// Firmware name of this sub-state.
    pub fn name(self) -> &'static str {
        match self {
            SubState::StartDelayBeforePhoto => "start_delay_before_photo",
            SubState::DelayBeforePhoto => "delay_before_photo",
            SubState::StartPhoto => "start_photo",
            SubState::PhotoBusy => "photo_busy",
            SubState::PauseAfterPhoto => "pause_after_photo",
            SubState::StartDelayAfterPhoto => "start_delay_after_photo",
            SubState::DelayAfterPhoto => "delay_after_photo",
            SubState::StartMovement => "start_movement",
            SubState::Movement => "movement",
            SubState::PauseAfterMovement => "pause_after_movement",
            SubState::NextStep => "next_step",
        }
    }

    /// `true` for the sub-states in which a one-shot action has finished and
    /// the device is waiting.
    pub fn is_pause(self) -> bool {
        matches!(
            self,
            SubState::PauseAfterPhoto | SubState::DelayAfterPhoto | SubState::PauseAfterMovement
        )
    }
}

impl TryFrom<u8> for SubState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        let sub_state = match value {
            0 => SubState::StartDelayBeforePhoto,
            1 => SubState::DelayBeforePhoto,
            2 => SubState::StartPhoto,
            3 => SubState::PhotoBusy,
            4 => SubState::PauseAfterPhoto,
            5 => SubState::StartDelayAfterPhoto,
            6 => SubState::DelayAfterPhoto,
            7 => SubState::StartMovement,
            8 => SubState::Movement,
            9 => SubState::PauseAfterMovement,
            10 => SubState::NextStep,
            other => return Err(other),
        };
        Ok(sub_state)
    }
}

impl fmt::Display for SubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Device status ─────────────────────────────────────────────────────────────

/// Decoded `status.stack` object of a `serial_get_status` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    pub state: StackState,
    pub sub_state: SubState,
    /// 1-based index of the step being executed.
    pub current_step: u32,
    pub stack_count: u32,
    pub is_stack_finished: bool,
    pub is_idle: bool,
}

#[derive(Deserialize)]
struct RawStackStatus {
    current_state: u8,
    current_sub_state: u8,
    current_step: u32,
    stack_count: u32,
    is_stack_finished: bool,
    is_idle: bool,
}

impl DeviceStatus {
    /// Parses the payload of a `serial_get_status` message.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidPayload`] if `status.stack` is missing,
    /// has the wrong shape, or carries an unknown state number.
    pub fn from_payload(payload: &Value) -> Result<Self, ProtocolError> {
        const KEY: &str = "serial_get_status";
        let stack = payload
            .get("status")
            .and_then(|status| status.get("stack"))
            .ok_or_else(|| invalid(KEY, "missing `status.stack`"))?;
        let raw = RawStackStatus::deserialize(stack).map_err(|e| invalid(KEY, e))?;

        let state = StackState::try_from(raw.current_state)
            .map_err(|n| invalid(KEY, format!("unknown current_state {n}")))?;
        let sub_state = SubState::try_from(raw.current_sub_state)
            .map_err(|n| invalid(KEY, format!("unknown current_sub_state {n}")))?;

        Ok(Self {
            state,
            sub_state,
            current_step: raw.current_step,
            stack_count: raw.stack_count,
            is_stack_finished: raw.is_stack_finished,
            is_idle: raw.is_idle,
        })
    }
}

// ── Firmware version ──────────────────────────────────────────────────────────

/// Working-tree state of the firmware repository at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoState {
    Clean = 0,
    Dirty = 1,
    Unknown = 2,
}

impl RepoState {
    fn from_code(code: u8) -> Self {
        match code {
            0 => RepoState::Clean,
            1 => RepoState::Dirty,
            _ => RepoState::Unknown,
        }
    }
}

impl fmt::Display for RepoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RepoState::Clean => "clean",
            RepoState::Dirty => "dirty",
            RepoState::Unknown => "unknown",
        })
    }
}

/// Firmware build identity from a `serial_get_version` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareVersion {
    /// Commit hash, decoded from the byte array the firmware sends.
    pub hash: String,
    pub staged: RepoState,
    pub unstaged: RepoState,
}

#[derive(Deserialize)]
struct RawVersion {
    hash: Vec<u8>,
    staged: u8,
    unstaged: u8,
}

impl FirmwareVersion {
    /// Parses the payload of a `serial_get_version` message.
    ///
    /// Hash bytes are taken one character per byte; trailing NUL padding is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidPayload`] if `version` is missing or
    /// malformed.
    pub fn from_payload(payload: &Value) -> Result<Self, ProtocolError> {
        const KEY: &str = "serial_get_version";
        let version = payload
            .get("version")
            .ok_or_else(|| invalid(KEY, "missing `version`"))?;
        let raw = RawVersion::deserialize(version).map_err(|e| invalid(KEY, e))?;

        let hash = raw
            .hash
            .iter()
            .map(|&b| char::from(b))
            .collect::<String>()
            .trim_end_matches('\0')
            .to_string();

        Ok(Self {
            hash,
            staged: RepoState::from_code(raw.staged),
            unstaged: RepoState::from_code(raw.unstaged),
        })
    }

    /// One-line description: the hash followed by any non-clean repo state.
    ///
    /// ```rust
    /// use stacker_core::protocol::{FirmwareVersion, RepoState};
    ///
    /// let v = FirmwareVersion {
    ///     hash: "3f2a9c1".to_string(),
    ///     staged: RepoState::Clean,
    ///     unstaged: RepoState::Dirty,
    /// };
    /// assert_eq!(v.describe(), "3f2a9c1 (Repo Unstaged: dirty)");
    /// ```
    pub fn describe(&self) -> String {
        let mut notes = Vec::new();
        if self.staged != RepoState::Clean {
            notes.push(format!("Repo Staged: {}", self.staged));
        }
        if self.unstaged != RepoState::Clean {
            notes.push(format!("Repo Unstaged: {}", self.unstaged));
        }
        if notes.is_empty() {
            self.hash.clone()
        } else {
            format!("{} ({})", self.hash, notes.join(", "))
        }
    }
}

// ── Inbound message ───────────────────────────────────────────────────────────

/// A decoded inbound message, keyed by its effective dispatch key.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// The relay has no serial port open.
    NoSerial,
    /// The relay failed to open `device`.
    ConnectFail { device: String },
    ConnectSuccess,
    Status(DeviceStatus),
    Version(FirmwareVersion),
    Config(NestedConfig),
    /// Any key this side has no typed model for.
    Other { key: String, payload: Value },
}

impl InboundMessage {
    /// Interprets `payload` according to the effective `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidPayload`] when a known key carries a
    /// payload of the wrong shape.
    pub fn parse(key: &str, payload: &Value) -> Result<Self, ProtocolError> {
        let message = match key {
            "no_serial" => InboundMessage::NoSerial,
            "connect_fail" => InboundMessage::ConnectFail {
                device: payload
                    .get("device")
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid(key, "missing string `device`"))?
                    .to_string(),
            },
            "connect_success" => InboundMessage::ConnectSuccess,
            "serial_get_status" => InboundMessage::Status(DeviceStatus::from_payload(payload)?),
            "serial_get_version" => {
                InboundMessage::Version(FirmwareVersion::from_payload(payload)?)
            }
            "serial_get_config" => {
                let config = payload
                    .get("config")
                    .ok_or_else(|| invalid(key, "missing `config`"))?;
                InboundMessage::Config(
                    NestedConfig::deserialize(config).map_err(|e| invalid(key, e))?,
                )
            }
            other => InboundMessage::Other {
                key: other.to_string(),
                payload: payload.clone(),
            },
        };
        Ok(message)
    }

    /// Decodes an [`Envelope`] into a typed message.
    ///
    /// # Errors
    ///
    /// Propagates effective-key and payload errors.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        Self::parse(&envelope.effective_key()?, &envelope.payload)
    }
}

fn invalid(key: &str, reason: impl fmt::Display) -> ProtocolError {
    ProtocolError::InvalidPayload {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
