//! Routing of inbound messages to handlers.
//!
//! Every inbound frame, and the two connection lifecycle events, is routed by
//! its effective key.  [`DispatchRegistry::dispatch`] calls exactly one
//! handler: the one registered for the key, or the fallback.
//!
//! # Outbound commands from handlers
//!
//! A handler never touches the socket.  It pushes the commands it wants sent
//! into an [`Outbox`]; the connection manager transmits them after the
//! handler returns, in push order.  This keeps handlers free of any
//! reference back into the manager that is calling them.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use stacker_core::protocol::OutboundCommand;
use tracing::warn;

// ── DispatchKey ───────────────────────────────────────────────────────────────

/// Effective key of an inbound message or lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DispatchKey {
    /// The connection opened (`onopen`).
    Open,
    /// The connection closed (`onclose`).
    Close,
    NoSerial,
    ConnectFail,
    ConnectSuccess,
    SerialGetStatus,
    SerialGetVersion,
    SerialGetConfig,
    /// Any other key, kept verbatim.
    Other(String),
}

impl DispatchKey {
    /// The string form of this key as computed from the wire.
    pub fn as_str(&self) -> &str {
        match self {
            DispatchKey::Open => "onopen",
            DispatchKey::Close => "onclose",
            DispatchKey::NoSerial => "no_serial",
            DispatchKey::ConnectFail => "connect_fail",
            DispatchKey::ConnectSuccess => "connect_success",
            DispatchKey::SerialGetStatus => "serial_get_status",
            DispatchKey::SerialGetVersion => "serial_get_version",
            DispatchKey::SerialGetConfig => "serial_get_config",
            DispatchKey::Other(key) => key,
        }
    }

    /// Maps an effective key string to its variant.
    ///
    /// ```rust
    /// use stacker_bridge::application::DispatchKey;
    ///
    /// assert_eq!(DispatchKey::parse("serial_get_config"), DispatchKey::SerialGetConfig);
    /// assert_eq!(
    ///     DispatchKey::parse("serial_action_stop"),
    ///     DispatchKey::Other("serial_action_stop".to_string())
    /// );
    /// ```
    pub fn parse(key: &str) -> Self {
        match key {
            "onopen" => DispatchKey::Open,
            "onclose" => DispatchKey::Close,
            "no_serial" => DispatchKey::NoSerial,
            "connect_fail" => DispatchKey::ConnectFail,
            "connect_success" => DispatchKey::ConnectSuccess,
            "serial_get_status" => DispatchKey::SerialGetStatus,
            "serial_get_version" => DispatchKey::SerialGetVersion,
            "serial_get_config" => DispatchKey::SerialGetConfig,
            other => DispatchKey::Other(other.to_string()),
        }
    }
}

impl fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Outbox ────────────────────────────────────────────────────────────────────

/// Commands queued by handlers, sent once the handler has returned.
#[derive(Debug, Default)]
pub struct Outbox {
    commands: Vec<OutboundCommand>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `command` for transmission.
    pub fn push(&mut self, command: impl Into<OutboundCommand>) {
        self.commands.push(command.into());
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Removes and returns every queued command in push order.
    pub fn drain(&mut self) -> std::vec::Drain<'_, OutboundCommand> {
        self.commands.drain(..)
    }
}

// ── DispatchRegistry ──────────────────────────────────────────────────────────

/// A message handler.  Receives the key it was invoked for, the payload, and
/// the outbox for follow-up commands.
pub type Handler = Box<dyn FnMut(&DispatchKey, &Value, &mut Outbox) + Send>;

/// Which handler [`DispatchRegistry::dispatch`] invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Registered,
    Fallback,
}

/// Maps effective keys to handlers, with an always-present fallback.
pub struct DispatchRegistry {
    handlers: HashMap<DispatchKey, Handler>,
    fallback: Handler,
}

impl DispatchRegistry {
    /// Creates an empty registry whose fallback logs the unhandled key.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: Box::new(|key: &DispatchKey, payload: &Value, _: &mut Outbox| {
                warn!(%key, %payload, "unhandled command");
            }),
        }
    }

    /// Registers `handler` for `key`, silently replacing any previous one.
    pub fn register<F>(&mut self, key: DispatchKey, handler: F)
    where
        F: FnMut(&DispatchKey, &Value, &mut Outbox) + Send + 'static,
    {
        self.handlers.insert(key, Box::new(handler));
    }

    /// Replaces the fallback handler.
    pub fn set_fallback<F>(&mut self, handler: F)
    where
        F: FnMut(&DispatchKey, &Value, &mut Outbox) + Send + 'static,
    {
        self.fallback = Box::new(handler);
    }

    /// Invokes exactly one handler for `key`.
    pub fn dispatch(
        &mut self,
        key: &DispatchKey,
        payload: &Value,
        outbox: &mut Outbox,
    ) -> Dispatched {
        match self.handlers.get_mut(key) {
            Some(handler) => {
                handler(key, payload, outbox);
                Dispatched::Registered
            }
            None => {
                (self.fallback)(key, payload, outbox);
                Dispatched::Fallback
            }
        }
    }
}

impl Default for DispatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DispatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchRegistry")
            .field("keys", &self.handlers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stacker_core::protocol::SerialRequest;
    use std::sync::{Arc, Mutex};

    /// Registers a handler that records every invocation under `name`.
    fn recording(
        registry: &mut DispatchRegistry,
        key: DispatchKey,
        name: &'static str,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) {
        let log = Arc::clone(log);
        registry.register(key, move |_, _, _| log.lock().unwrap().push(name));
    }

    #[test]
    fn test_parse_and_as_str_agree_for_known_keys() {
        for key in [
            "onopen",
            "onclose",
            "no_serial",
            "connect_fail",
            "connect_success",
            "serial_get_status",
            "serial_get_version",
            "serial_get_config",
        ] {
            let parsed = DispatchKey::parse(key);
            assert!(!matches!(parsed, DispatchKey::Other(_)), "{key}");
            assert_eq!(parsed.as_str(), key);
        }
    }

    #[test]
    fn test_registered_handler_is_invoked() {
        // Arrange
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = DispatchRegistry::new();
        recording(&mut registry, DispatchKey::NoSerial, "no_serial", &log);

        // Act
        let which = registry.dispatch(&DispatchKey::NoSerial, &json!(""), &mut Outbox::new());

        // Assert
        assert_eq!(which, Dispatched::Registered);
        assert_eq!(*log.lock().unwrap(), vec!["no_serial"]);
    }

    #[test]
    fn test_unregistered_key_invokes_fallback_exactly_once() {
        // Arrange
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = DispatchRegistry::new();
        recording(&mut registry, DispatchKey::ConnectSuccess, "connect_success", &log);
        let fallback_log = Arc::clone(&log);
        registry.set_fallback(move |_, _, _| fallback_log.lock().unwrap().push("fallback"));

        // Act
        let key = DispatchKey::parse("serial_get_temperature");
        let which = registry.dispatch(&key, &json!({}), &mut Outbox::new());

        // Assert
        assert_eq!(which, Dispatched::Fallback);
        assert_eq!(*log.lock().unwrap(), vec!["fallback"]);
    }

    #[test]
    fn test_default_fallback_is_used_when_none_set() {
        let mut registry = DispatchRegistry::new();
        let which = registry.dispatch(&DispatchKey::Close, &Value::Null, &mut Outbox::new());
        assert_eq!(which, Dispatched::Fallback);
    }

    #[test]
    fn test_register_replaces_previous_handler() {
        // Arrange
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = DispatchRegistry::new();
        recording(&mut registry, DispatchKey::Open, "first", &log);
        recording(&mut registry, DispatchKey::Open, "second", &log);

        // Act
        registry.dispatch(&DispatchKey::Open, &Value::Null, &mut Outbox::new());

        // Assert
        assert_eq!(*log.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn test_handler_receives_key_and_payload() {
        let seen = Arc::new(Mutex::new(None));
        let mut registry = DispatchRegistry::new();
        let sink = Arc::clone(&seen);
        registry.register(DispatchKey::ConnectFail, move |key, payload, _| {
            *sink.lock().unwrap() = Some((key.clone(), payload["device"].clone()));
        });

        let payload = json!({"device": "COM1"});
        registry.dispatch(&DispatchKey::ConnectFail, &payload, &mut Outbox::new());

        assert_eq!(
            *seen.lock().unwrap(),
            Some((DispatchKey::ConnectFail, json!("COM1")))
        );
    }

    #[test]
    fn test_outbox_keeps_push_order() {
        // Arrange
        let mut registry = DispatchRegistry::new();
        registry.register(DispatchKey::ConnectSuccess, |_, _, outbox| {
            outbox.push(SerialRequest::GetVersion);
            outbox.push(OutboundCommand::GetSerialStatus);
        });
        let mut outbox = Outbox::new();

        // Act
        registry.dispatch(&DispatchKey::ConnectSuccess, &json!(""), &mut outbox);

        // Assert
        let sent: Vec<OutboundCommand> = outbox.drain().collect();
        assert_eq!(
            sent,
            vec![
                OutboundCommand::Serial(SerialRequest::GetVersion),
                OutboundCommand::GetSerialStatus
            ]
        );
        assert!(outbox.is_empty());
    }
}
