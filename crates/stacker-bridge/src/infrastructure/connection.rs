//! The session with the relay: connect, dispatch, send, reconnect.
//!
//! [`ConnectionManager`] owns the transport, the dispatch registry and the
//! connection state.  Everything happens on the task that drives
//! [`ConnectionManager::run`], one event at a time:
//!
//! | Event                       | Reaction                                         |
//! |-----------------------------|--------------------------------------------------|
//! | socket opened               | `Connected`, `onopen` handler, send `get_serial_status` |
//! | text frame                  | decode, compute effective key, dispatch          |
//! | socket closed               | `Disconnected`, `onclose` handler, arm reconnect |
//! | reconnect deadline reached  | open the stored address again                    |
//! | queued command              | send it if connected, drop it otherwise          |
//! | shutdown token cancelled    | close the socket and return                      |
//!
//! # Reconnect policy
//!
//! Every close arms exactly one reconnect after the configured fixed delay.
//! There is no backoff growth and no retry limit.  The deadline is cleared by
//! a manual [`reconnect`](ConnectionManager::reconnect), by a new
//! [`open`](ConnectionManager::open), and when it fires.
//!
//! # Delivery
//!
//! Sending is at-most-once and fire-and-forget: a command sent while not
//! connected is dropped, never queued for later.

use serde_json::Value;
use stacker_core::protocol::envelope::decode;
use stacker_core::protocol::{OutboundCommand, ProtocolError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::transport::{Transport, TransportError, TransportEvent};
use crate::application::{DispatchKey, DispatchRegistry, Dispatched, Outbox};
use crate::domain::{BridgeConfig, ConnectionId, ConnectionState};

/// The single session with the relay.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    registry: DispatchRegistry,
    config: BridgeConfig,
    state: ConnectionState,
    /// Socket whose events are accepted; events for any other id are stale.
    current: Option<ConnectionId>,
    /// Address of the last `open`, reused for reconnects.
    address: Option<String>,
    reconnect_at: Option<Instant>,
    events_tx: UnboundedSender<TransportEvent>,
    events_rx: UnboundedReceiver<TransportEvent>,
    commands_tx: UnboundedSender<OutboundCommand>,
    commands_rx: UnboundedReceiver<OutboundCommand>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, registry: DispatchRegistry, config: BridgeConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            registry,
            config,
            state: ConnectionState::Disconnected,
            current: None,
            address: None,
            reconnect_at: None,
            events_tx,
            events_rx,
            commands_tx,
            commands_rx,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// When the pending reconnect will fire, if one is armed.
    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// A handle for queuing commands from other tasks; they are sent by
    /// [`run`](Self::run) in arrival order.
    pub fn command_sender(&self) -> UnboundedSender<OutboundCommand> {
        self.commands_tx.clone()
    }

    // ── Operations ────────────────────────────────────────────────────────────

    /// Starts connecting to `address` and remembers it for reconnects.
    ///
    /// Any armed reconnect is cleared.
    ///
    /// # Errors
    ///
    /// Returns the transport's synchronous error.  The session then stays
    /// `Disconnected` and no reconnect is scheduled.
    pub fn open(&mut self, address: &str) -> Result<(), TransportError> {
        self.reconnect_at = None;
        self.address = Some(address.to_string());

        match self.transport.open(address, self.events_tx.clone()) {
            Ok(id) => {
                info!(%address, %id, "connecting to relay");
                self.current = Some(id);
                self.state = ConnectionState::Connecting;
                Ok(())
            }
            Err(e) => {
                warn!(%address, error = %e, "could not start connection; not retrying");
                self.current = None;
                self.state = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }

    /// Closes the current socket and opens the stored address again,
    /// cancelling any armed reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if nothing was ever opened, or the
    /// transport's synchronous error.
    pub fn reconnect(&mut self) -> Result<(), TransportError> {
        let address = self.address.clone().ok_or(TransportError::Closed)?;
        self.transport.close();
        self.current = None;
        self.state = ConnectionState::Disconnected;
        self.open(&address)
    }

    /// Encodes and transmits `command` if connected.
    ///
    /// Returns `true` if the frame was handed to the transport.
    pub fn send(&mut self, command: &OutboundCommand) -> bool {
        if !self.is_connected() {
            debug!(command = command.command_type(), "not connected; dropping command");
            return false;
        }

        let frame = match command.encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "could not encode command");
                return false;
            }
        };

        debug!(%frame, "send");
        match self.transport.transmit(frame) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "transmit failed");
                false
            }
        }
    }

    /// Applies one transport event.  Events from stale sockets are ignored.
    pub fn handle_event(&mut self, event: TransportEvent) {
        if self.current != Some(event.connection()) {
            debug!(?event, "ignoring event from stale socket");
            return;
        }

        match event {
            TransportEvent::Opened(_) => self.on_open(),
            TransportEvent::Message(_, frame) => self.on_message(&frame),
            TransportEvent::Closed(_) => self.on_close(),
        }
    }

    /// Applies every transport event and queued command that is already
    /// waiting, without blocking.  Returns how many were handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        while let Ok(command) = self.commands_rx.try_recv() {
            self.send(&command);
            handled += 1;
        }
        handled
    }

    /// Runs the event loop until `shutdown` is cancelled, then closes the
    /// socket.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        loop {
            let deadline = self.reconnect_at;
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                Some(command) = self.commands_rx.recv() => {
                    self.send(&command);
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_reconnect();
                }
            }
        }

        info!("shutting down connection");
        self.transport.close();
        self.current = None;
        self.state = ConnectionState::Disconnected;
        self.reconnect_at = None;
    }

    // ── Event reactions ───────────────────────────────────────────────────────

    fn on_open(&mut self) {
        self.state = ConnectionState::Connected;
        self.dispatch(&DispatchKey::Open, &Value::Null);
        self.send(&OutboundCommand::GetSerialStatus);
    }

    fn on_close(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.current = None;
        self.dispatch(&DispatchKey::Close, &Value::Null);

        let delay = self.config.reconnect_delay;
        self.reconnect_at = Some(Instant::now() + delay);
        info!(?delay, "connection closed; reconnect scheduled");
    }

    fn on_message(&mut self, frame: &str) {
        debug!(%frame, "recv");
        match Self::route(frame) {
            Ok((key, payload)) => self.dispatch(&key, &payload),
            Err(e) => warn!(error = %e, %frame, "dropping malformed frame"),
        }
    }

    fn route(frame: &str) -> Result<(DispatchKey, Value), ProtocolError> {
        let envelope = decode(frame)?;
        let key = DispatchKey::parse(&envelope.effective_key()?);
        Ok((key, envelope.payload))
    }

    fn fire_reconnect(&mut self) {
        self.reconnect_at = None;
        let Some(address) = self.address.clone() else {
            return;
        };
        info!(%address, "reconnecting");
        if let Err(e) = self.open(&address) {
            // `open` already warned; nothing re-arms the timer after this.
            debug!(error = %e, "reconnect chain ended");
        }
    }

    /// Invokes the handler for `key`, then sends whatever it queued.
    fn dispatch(&mut self, key: &DispatchKey, payload: &Value) {
        let mut outbox = Outbox::new();
        if self.registry.dispatch(key, payload, &mut outbox) == Dispatched::Fallback {
            debug!(%key, "dispatched to fallback");
        }
        if outbox.is_empty() {
            return;
        }
        let queued: Vec<OutboundCommand> = outbox.drain().collect();
        for command in &queued {
            self.send(command);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
