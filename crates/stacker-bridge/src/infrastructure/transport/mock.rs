//! In-memory transport for tests.
//!
//! # Why a recording transport?
//!
//! The real [`WebSocketTransport`](super::WebSocketTransport) needs a relay
//! to talk to, and its timing depends on the network.  `RecordingTransport`
//! instead records every open attempt, transmitted frame, and close, and lets
//! the test decide when the socket "opens", what frames "arrive", and when the
//! connection "drops".
//!
//! # Usage in tests
//!
//! ```ignore
//! let transport = RecordingTransport::new();
//! let mut manager = ConnectionManager::new(transport.clone(), registry, config);
//!
//! manager.open("127.0.0.1:8080/ws")?;
//! transport.accept();                 // the socket opens
//! manager.process_pending();          // the manager sends get_serial_status
//!
//! assert_eq!(transport.sent(), vec![r#"["get_serial_status",""]"#]);
//! ```
//!
//! # `should_fail` flag
//!
//! Call [`RecordingTransport::set_should_fail`] to make every following
//! `open` fail synchronously with [`TransportError::InvalidAddress`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::UnboundedSender;

use super::{Transport, TransportError, TransportEvent};
use crate::domain::{ConnectionId, ConnectionIdGenerator};

#[derive(Debug, Default)]
struct Recorded {
    /// Every address passed to `open`, including failed attempts.
    opened: Vec<String>,
    /// Every frame accepted by `transmit`.
    sent: Vec<String>,
    /// Number of `close` calls that closed a socket.
    closes: usize,
    current: Option<ConnectionId>,
    events: Option<UnboundedSender<TransportEvent>>,
}

/// A transport that records calls instead of touching the network.
///
/// Clones share the same recording, so a test can keep one clone while the
/// connection manager owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    ids: Arc<ConnectionIdGenerator>,
    inner: Arc<Mutex<Recorded>>,
    should_fail: Arc<AtomicBool>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `open` calls fail (or succeed again).
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    /// Addresses of all open attempts, in order.
    pub fn opened(&self) -> Vec<String> {
        self.lock().opened.clone()
    }

    /// Frames transmitted so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    /// Id of the current socket, if one is open or opening.
    pub fn current(&self) -> Option<ConnectionId> {
        self.lock().current
    }

    /// Reports that the current socket has opened.
    pub fn accept(&self) -> bool {
        self.emit_current(TransportEvent::Opened)
    }

    /// Delivers a text frame on the current socket.
    pub fn deliver(&self, frame: &str) -> bool {
        self.emit_current(|id| TransportEvent::Message(id, frame.to_string()))
    }

    /// Reports that the current socket closed.  The socket is forgotten.
    pub fn drop_connection(&self) -> bool {
        let sent = self.emit_current(TransportEvent::Closed);
        self.lock().current = None;
        sent
    }

    /// Sends an arbitrary event, for example one tagged with a stale id.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.lock()
            .events
            .as_ref()
            .is_some_and(|events| events.send(event).is_ok())
    }

    fn emit_current(&self, make: impl FnOnce(ConnectionId) -> TransportEvent) -> bool {
        match self.current() {
            Some(id) => self.emit(make(id)),
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for RecordingTransport {
    fn open(
        &mut self,
        address: &str,
        events: UnboundedSender<TransportEvent>,
    ) -> Result<ConnectionId, TransportError> {
        let mut recorded = self.lock();
        recorded.opened.push(address.to_string());

        if self.should_fail.load(Ordering::Relaxed) {
            return Err(TransportError::InvalidAddress {
                address: address.to_string(),
                reason: "rejected by RecordingTransport".to_string(),
            });
        }

        let id = self.ids.next();
        recorded.current = Some(id);
        recorded.events = Some(events);
        Ok(id)
    }

    fn transmit(&mut self, frame: String) -> Result<(), TransportError> {
        let mut recorded = self.lock();
        if recorded.current.is_none() {
            return Err(TransportError::Closed);
        }
        recorded.sent.push(frame);
        Ok(())
    }

    fn close(&mut self) {
        let mut recorded = self.lock();
        if recorded.current.take().is_some() {
            recorded.closes += 1;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
