//! Operator-side behaviour: what happens when each message arrives.
//!
//! The [`Controller`] installs one handler per known key into a
//! [`DispatchRegistry`].  Together they form the start-up chain
//!
//! ```text
//! onopen ─▶ (manager sends get_serial_status)
//! connect_success ─▶ get_version ─▶ get_config ─▶ form refreshed ─▶ intent
//! ```
//!
//! and keep the operator view current: connectivity, serial-port notices,
//! firmware version, and the rendered device status.
//!
//! # Intents
//!
//! The binary runs one operator [`Intent`] per invocation.  Device actions
//! wait until the first `serial_get_config` so they act on a known
//! configuration; `connect-serial` is sent as soon as the socket opens
//! because the device cannot answer before a port is open.
//!
//! # Shared state
//!
//! Handlers are separate closures, so the state they update lives behind an
//! `Arc<Mutex<...>>`.  A poisoned lock is recovered rather than propagated:
//! the state is plain data and stays consistent between handler calls.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use stacker_core::config::{FlatConfig, Scalar, UiConfig, STACK_MOVE_DEGREES_KEY};
use stacker_core::protocol::{InboundMessage, OutboundCommand, SerialRequest};
use stacker_core::view::StatusView;
use tracing::{debug, info, warn};

use super::dispatch::{DispatchKey, DispatchRegistry, Outbox};

/// Shown when the relay reports that no serial port is open.
pub const NO_SERIAL_NOTICE: &str =
    "Not connected to a serial port. Connect to a serial port first.";

/// What the operator asked the binary to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Only watch the device.
    Monitor,
    /// Open `device` on the relay.
    ConnectSerial(String),
    /// Move the stack motor by a number of steps.
    Move(i64),
    /// Move by a rotation, converted with the device's transmission ratio.
    MoveDegrees(i64),
    Stack,
    Stop,
    Photo,
    /// Apply form edits, upload the configuration and read it back.
    Set(FlatConfig),
}

/// Snapshot of everything the operator sees.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    /// Whether the WebSocket to the relay is open.
    pub websocket_connected: bool,
    /// Serial-port or configuration problem to show, if any.
    pub notice: Option<String>,
    /// `true` between `connect_success` and the first version reply.
    pub awaiting_version: bool,
    /// Described firmware version, once received.
    pub firmware: Option<String>,
    /// The configuration as the form shows it.
    pub ui: UiConfig,
    /// Whether `ui` reflects a configuration read from the device.
    pub config_loaded: bool,
    /// The last rendered status report.
    pub status: Option<StatusView>,
    /// Last progress bar width; kept while the device is not running.
    pub progress_percent: f64,
    /// Intent still waiting to run.
    pub pending: Option<Intent>,
}

impl ControllerState {
    fn new(intent: Intent) -> Self {
        Self {
            websocket_connected: false,
            notice: None,
            awaiting_version: false,
            firmware: None,
            ui: UiConfig::default(),
            config_loaded: false,
            status: None,
            progress_percent: 0.0,
            pending: match intent {
                Intent::Monitor => None,
                other => Some(other),
            },
        }
    }
}

/// Installs the operator-side handlers and exposes their shared state.
#[derive(Debug, Clone)]
pub struct Controller {
    state: Arc<Mutex<ControllerState>>,
}

impl Controller {
    pub fn new(intent: Intent) -> Self {
        Self {
            state: Arc::new(Mutex::new(ControllerState::new(intent))),
        }
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> ControllerState {
        self.lock().clone()
    }

    /// Registers a handler for every key the operator side understands.
    pub fn install(&self, registry: &mut DispatchRegistry) {
        for key in [
            DispatchKey::Open,
            DispatchKey::Close,
            DispatchKey::NoSerial,
            DispatchKey::ConnectFail,
            DispatchKey::ConnectSuccess,
            DispatchKey::SerialGetStatus,
            DispatchKey::SerialGetVersion,
            DispatchKey::SerialGetConfig,
        ] {
            let this = self.clone();
            registry.register(key, move |key, payload, outbox| {
                this.handle(key, payload, outbox);
            });
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, key: &DispatchKey, payload: &Value, outbox: &mut Outbox) {
        match key {
            DispatchKey::Open => self.on_open(outbox),
            DispatchKey::Close => self.on_close(),
            _ => match InboundMessage::parse(key.as_str(), payload) {
                Ok(message) => self.on_message(message, outbox),
                Err(e) => warn!(%key, error = %e, "dropping message with invalid payload"),
            },
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    fn on_open(&self, outbox: &mut Outbox) {
        let mut state = self.lock();
        state.websocket_connected = true;
        info!("connected to relay");

        if matches!(state.pending, Some(Intent::ConnectSerial(_))) {
            if let Some(Intent::ConnectSerial(device)) = state.pending.take() {
                info!(%device, "requesting serial port");
                outbox.push(OutboundCommand::ConnectSerial { device });
            }
        }
    }

    fn on_close(&self) {
        let mut state = self.lock();
        if state.websocket_connected {
            warn!("connection to relay lost");
        }
        state.websocket_connected = false;
    }

    // ── Messages ──────────────────────────────────────────────────────────────

    fn on_message(&self, message: InboundMessage, outbox: &mut Outbox) {
        let mut state = self.lock();
        match message {
            InboundMessage::NoSerial => {
                warn!("{NO_SERIAL_NOTICE}");
                state.notice = Some(NO_SERIAL_NOTICE.to_string());
            }
            InboundMessage::ConnectFail { device } => {
                let notice = format!(
                    "Could not connect to \"{device}\", do you have the permission to do so?"
                );
                warn!("{notice}");
                state.notice = Some(notice);
            }
            InboundMessage::ConnectSuccess => {
                info!("relay opened the serial port");
                state.notice = None;
                state.awaiting_version = true;
                outbox.push(SerialRequest::GetVersion);
            }
            InboundMessage::Version(version) => {
                let described = version.describe();
                info!(firmware = %described, "firmware version");
                state.firmware = Some(described);
                state.awaiting_version = false;
                outbox.push(SerialRequest::GetConfig);
            }
            InboundMessage::Config(config) => {
                match state.ui.load_device_config(&config) {
                    Ok(()) => {
                        state.config_loaded = true;
                        debug!(?config, "device configuration refreshed");
                    }
                    Err(e) => {
                        warn!(error = %e, "device reported an unusable configuration");
                        state.notice = Some(e.to_string());
                        return;
                    }
                }
                if let Some(intent) = state.pending.take() {
                    run_intent(&mut state, intent, outbox);
                }
            }
            InboundMessage::Status(status) => {
                let view = StatusView::from_status(&status);
                if let Some(percent) = view.progress_percent {
                    state.progress_percent = percent;
                }
                let changed = state
                    .status
                    .as_ref()
                    .map_or(true, |previous| previous.operation_text != view.operation_text);
                if changed {
                    info!(status = %view, "device status");
                } else {
                    debug!(status = %view, "device status");
                }
                state.status = Some(view);
            }
            InboundMessage::Other { key, .. } => {
                debug!(%key, "ignoring message without a typed handler");
            }
        }
    }
}

/// Turns an intent into device commands once the configuration is known.
fn run_intent(state: &mut ControllerState, intent: Intent, outbox: &mut Outbox) {
    info!(?intent, "running operator intent");
    match intent {
        Intent::Monitor | Intent::ConnectSerial(_) => {}
        Intent::Move(steps) => outbox.push(SerialRequest::ActionMotor { steps }),
        Intent::MoveDegrees(degrees) => {
            let form =
                FlatConfig::from([(STACK_MOVE_DEGREES_KEY.to_string(), Scalar::Int(degrees))]);
            match state.ui.read_form(&form) {
                Ok(()) => outbox.push(SerialRequest::ActionMotor {
                    steps: state.ui.stack_move_steps(),
                }),
                Err(e) => reject(state, &e),
            }
        }
        Intent::Stack => outbox.push(SerialRequest::ActionStack),
        Intent::Stop => {
            state.progress_percent = 0.0;
            outbox.push(SerialRequest::ActionStop);
        }
        Intent::Photo => outbox.push(SerialRequest::ActionPhoto),
        Intent::Set(form) => {
            let upload = state
                .ui
                .read_form(&form)
                .and_then(|()| state.ui.to_device_config());
            match upload {
                Ok(config) => {
                    outbox.push(SerialRequest::SetConfig(config));
                    outbox.push(SerialRequest::GetConfig);
                }
                Err(e) => reject(state, &e),
            }
        }
    }
}

fn reject(state: &mut ControllerState, error: &dyn std::error::Error) {
    warn!(%error, "operator intent rejected");
    state.notice = Some(error.to_string());
}

// ── Tests ─────────────────────────────────────────────────────────────────────
