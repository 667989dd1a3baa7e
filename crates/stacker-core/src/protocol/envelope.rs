//! JSON codec for the two-element message envelope.
//!
//! Wire format (one WebSocket text frame per envelope):
//! ```text
//! [command_type, payload]
//! ```
//! `command_type` is always a JSON string.  `payload` is any JSON value; the
//! relay uses `""` for commands without arguments.
//!
//! # The `serial` sub-protocol
//!
//! Messages that travel all the way to the device use `command_type ==
//! "serial"` and carry a `msg_type` discriminator inside the payload:
//!
//! ```json
//! ["serial", {"msg_type": "get_config"}]
//! ```
//!
//! For routing purposes the two levels collapse into a single *effective
//! dispatch key*: `"serial_" + msg_type` (e.g. `serial_get_config`).  All other
//! command types are their own key.

use serde_json::Value;
use thiserror::Error;

/// The `command_type` that introduces the device sub-protocol.
pub const SERIAL_COMMAND: &str = "serial";

/// Prefix prepended to `msg_type` to form the effective key of serial messages.
pub const SERIAL_KEY_PREFIX: &str = "serial_";

/// Name of the payload field that carries the serial message type.
pub const MSG_TYPE_FIELD: &str = "msg_type";

/// Errors that can occur while encoding, decoding, or interpreting envelopes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not a two-element JSON array with a string first element.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// A `serial` envelope without a string `msg_type` in its payload.
    #[error("serial envelope is missing a string `msg_type` field")]
    MissingMsgType,

    /// The frame text is not valid JSON or a value could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload of a known message does not have the expected shape.
    #[error("invalid payload for `{key}`: {reason}")]
    InvalidPayload { key: String, reason: String },
}

/// One decoded `[command_type, payload]` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// First element of the wire array.
    pub command_type: String,
    /// Second element of the wire array.
    pub payload: Value,
}

impl Envelope {
    /// Creates an envelope from its two parts.
    pub fn new(command_type: impl Into<String>, payload: Value) -> Self {
        Self {
            command_type: command_type.into(),
            payload,
        }
    }

    /// Serializes this envelope to its wire text.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if the payload cannot be serialized.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        encode(&self.command_type, &self.payload)
    }

    /// Returns the key this envelope is routed under.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MissingMsgType`] for a `serial` envelope
    /// without a string `msg_type`.
    pub fn effective_key(&self) -> Result<String, ProtocolError> {
        effective_key(&self.command_type, &self.payload)
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes `(command_type, payload)` as the JSON text `[command_type, payload]`.
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] if serialization fails.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use stacker_core::protocol::envelope::encode;
///
/// let frame = encode("serial", &json!({"msg_type": "get_config"})).unwrap();
/// assert_eq!(frame, r#"["serial",{"msg_type":"get_config"}]"#);
/// ```
pub fn encode(command_type: &str, payload: &Value) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(&(command_type, payload))?)
}

/// Decodes one wire frame into an [`Envelope`].
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] if the text is not JSON, and
/// [`ProtocolError::MalformedEnvelope`] if it is JSON but not a two-element
/// array whose first element is a string.
///
/// # Examples
///
/// ```rust
/// use stacker_core::protocol::envelope::decode;
///
/// let env = decode(r#"["connect_success", ""]"#).unwrap();
/// assert_eq!(env.command_type, "connect_success");
/// assert!(decode(r#"["only_one"]"#).is_err());
/// ```
pub fn decode(frame: &str) -> Result<Envelope, ProtocolError> {
    let value: Value = serde_json::from_str(frame)?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(ProtocolError::MalformedEnvelope(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            )))
        }
    };

    let [command, payload]: [Value; 2] = items.try_into().map_err(|items: Vec<Value>| {
        ProtocolError::MalformedEnvelope(format!("expected 2 elements, got {}", items.len()))
    })?;

    let command_type = match command {
        Value::String(command_type) => command_type,
        other => {
            return Err(ProtocolError::MalformedEnvelope(format!(
                "command type must be a string, got {}",
                json_kind(&other)
            )))
        }
    };

    Ok(Envelope {
        command_type,
        payload,
    })
}

/// Computes the effective dispatch key of `(command_type, payload)`.
///
/// # Errors
///
/// Returns [`ProtocolError::MissingMsgType`] if `command_type` is `"serial"`
/// and the payload has no string `msg_type`.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use stacker_core::protocol::envelope::effective_key;
///
/// assert_eq!(effective_key("no_serial", &json!("")).unwrap(), "no_serial");
/// assert_eq!(
///     effective_key("serial", &json!({"msg_type": "get_status"})).unwrap(),
///     "serial_get_status"
/// );
/// ```
pub fn effective_key(command_type: &str, payload: &Value) -> Result<String, ProtocolError> {
    if command_type != SERIAL_COMMAND {
        return Ok(command_type.to_string());
    }

    payload
        .get(MSG_TYPE_FIELD)
        .and_then(Value::as_str)
        .map(|msg_type| format!("{SERIAL_KEY_PREFIX}{msg_type}"))
        .ok_or(ProtocolError::MissingMsgType)
}

/// Short JSON type name used in error messages.
fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
