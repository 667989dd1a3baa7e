//! Outbound commands sent from the operator side to the relay.
//!
//! Three command types exist on the wire:
//!
//! | Command             | Payload                                   |
//! |---------------------|-------------------------------------------|
//! | `connect_serial`    | `{"device": "<port>"}`                    |
//! | `get_serial_status` | `""`                                      |
//! | `serial`            | `{"msg_type": "<type>", ...}` (see below) |
//!
//! `serial` commands are forwarded unchanged to the device.  Their `msg_type`
//! and extra fields are modelled by [`SerialRequest`].

use serde_json::{json, Value};

use super::envelope::{Envelope, ProtocolError, SERIAL_COMMAND};
use crate::config::NestedConfig;

/// A message the operator side can send to the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundCommand {
    /// Asks the relay to open the named serial port.
    ConnectSerial { device: String },
    /// Asks the relay whether a serial port is open.
    GetSerialStatus,
    /// A request forwarded to the device.
    Serial(SerialRequest),
}

/// Device requests carried inside a `serial` envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum SerialRequest {
    GetVersion,
    GetConfig,
    /// Uploads a complete configuration.
    SetConfig(NestedConfig),
    /// Moves the stack motor by `steps`; the sign selects the direction.
    ActionMotor { steps: i64 },
    /// Starts a stacking run with the current configuration.
    ActionStack,
    ActionStop,
    /// Takes a single photo.
    ActionPhoto,
}

impl SerialRequest {
    /// The `msg_type` discriminator of this request.
    pub fn msg_type(&self) -> &'static str {
        match self {
            SerialRequest::GetVersion => "get_version",
            SerialRequest::GetConfig => "get_config",
            SerialRequest::SetConfig(_) => "set_config",
            SerialRequest::ActionMotor { .. } => "action_motor",
            SerialRequest::ActionStack => "action_stack",
            SerialRequest::ActionStop => "action_stop",
            SerialRequest::ActionPhoto => "action_photo",
        }
    }

    /// Builds the JSON object sent as the `serial` payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if the configuration cannot be
    /// serialized.
    pub fn payload(&self) -> Result<Value, ProtocolError> {
        let mut payload = json!({ "msg_type": self.msg_type() });
        match self {
            SerialRequest::SetConfig(config) => {
                payload["config"] = serde_json::to_value(config)?;
            }
            SerialRequest::ActionMotor { steps } => {
                payload["action_motor"] = json!({ "steps": steps });
            }
            _ => {}
        }
        Ok(payload)
    }
}

impl OutboundCommand {
    /// The first element of the wire envelope.
    pub fn command_type(&self) -> &'static str {
        match self {
            OutboundCommand::ConnectSerial { .. } => "connect_serial",
            OutboundCommand::GetSerialStatus => "get_serial_status",
            OutboundCommand::Serial(_) => SERIAL_COMMAND,
        }
    }

    /// Builds the second element of the wire envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if a payload cannot be serialized.
    pub fn payload(&self) -> Result<Value, ProtocolError> {
        match self {
            OutboundCommand::ConnectSerial { device } => Ok(json!({ "device": device })),
            OutboundCommand::GetSerialStatus => Ok(Value::String(String::new())),
            OutboundCommand::Serial(request) => request.payload(),
        }
    }

    /// Converts this command into an [`Envelope`].
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if the payload cannot be serialized.
    pub fn to_envelope(&self) -> Result<Envelope, ProtocolError> {
        Ok(Envelope::new(self.command_type(), self.payload()?))
    }

    /// Encodes this command as wire text.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if the payload cannot be serialized.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stacker_core::protocol::{OutboundCommand, SerialRequest};
    ///
    /// let frame = OutboundCommand::Serial(SerialRequest::ActionMotor { steps: -40 })
    ///     .encode()
    ///     .unwrap();
    /// assert_eq!(
    ///     frame,
    ///     r#"["serial",{"action_motor":{"steps":-40},"msg_type":"action_motor"}]"#
    /// );
    /// ```
    pub fn encode(&self) -> Result<String, ProtocolError> {
        self.to_envelope()?.encode()
    }
}

impl From<SerialRequest> for OutboundCommand {
    fn from(request: SerialRequest) -> Self {
        OutboundCommand::Serial(request)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::envelope::decode;

    #[test]
    fn test_connect_serial_carries_device() {
        // Arrange
        let cmd = OutboundCommand::ConnectSerial {
            device: "/dev/ttyUSB0".to_string(),
        };

        // Act
        let frame = cmd.encode().unwrap();

        // Assert
        assert_eq!(frame, r#"["connect_serial",{"device":"/dev/ttyUSB0"}]"#);
    }

    #[test]
    fn test_get_serial_status_has_empty_string_payload() {
        let frame = OutboundCommand::GetSerialStatus.encode().unwrap();
        assert_eq!(frame, r#"["get_serial_status",""]"#);
    }

    #[test]
    fn test_plain_serial_requests_route_to_serial_keys() {
        let requests = [
            (SerialRequest::GetVersion, "serial_get_version"),
            (SerialRequest::GetConfig, "serial_get_config"),
            (SerialRequest::ActionStack, "serial_action_stack"),
            (SerialRequest::ActionStop, "serial_action_stop"),
            (SerialRequest::ActionPhoto, "serial_action_photo"),
        ];
        for (request, key) in requests {
            let env = OutboundCommand::from(request).to_envelope().unwrap();
            assert_eq!(env.command_type, "serial");
            assert_eq!(env.effective_key().unwrap(), key);
        }
    }

    #[test]
    fn test_action_motor_nests_steps() {
        // Arrange
        let cmd = OutboundCommand::Serial(SerialRequest::ActionMotor { steps: 250 });

        // Act
        let env = decode(&cmd.encode().unwrap()).unwrap();

        // Assert
        assert_eq!(env.payload["msg_type"], "action_motor");
        assert_eq!(env.payload["action_motor"]["steps"], 250);
    }

    #[test]
    fn test_set_config_embeds_nested_config() {
        // Arrange
        let mut config = NestedConfig::default();
        config.stack.stack_count = 42;

        // Act
        let payload = SerialRequest::SetConfig(config).payload().unwrap();

        // Assert
        assert_eq!(payload["msg_type"], "set_config");
        assert_eq!(payload["config"]["stack"]["stack_count"], 42);
        assert_eq!(payload["config"]["motor"]["max_width"], 4000);
    }
}
