//! The socket seam between the connection manager and the network.
//!
//! A [`Transport`] opens one socket at a time and reports everything it
//! observes as [`TransportEvent`]s on a channel supplied by the caller.
//! Opening is split in two phases:
//!
//! 1. [`Transport::open`] validates the address and starts connecting.  An
//!    `Err` here is a *synchronous* failure: nothing was started and no event
//!    will follow.
//! 2. The outcome arrives later as [`TransportEvent::Opened`] or, if the
//!    connection attempt fails, [`TransportEvent::Closed`].
//!
//! Implementations:
//!
//! - [`websocket::WebSocketTransport`]: the real client (tokio-tungstenite).
//! - [`mock::RecordingTransport`]: records opens and frames in memory and
//!   lets tests inject events.

pub mod mock;
pub mod websocket;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::domain::ConnectionId;

pub use mock::RecordingTransport;
pub use websocket::WebSocketTransport;

/// Errors reported synchronously by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The address does not form a valid `ws://` URL.
    #[error("invalid WebSocket address `{address}`: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// There is no open socket to transmit on.
    #[error("connection is closed")]
    Closed,
}

/// Something a transport observed on one of its sockets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The socket is open and ready for frames.
    Opened(ConnectionId),
    /// A text frame arrived.
    Message(ConnectionId, String),
    /// The socket closed, or never managed to open.
    Closed(ConnectionId),
}

impl TransportEvent {
    /// The socket this event belongs to.
    pub fn connection(&self) -> ConnectionId {
        match self {
            TransportEvent::Opened(id)
            | TransportEvent::Message(id, _)
            | TransportEvent::Closed(id) => *id,
        }
    }
}

/// A single-socket text-frame transport.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Starts connecting to `address` (`host:port/path`, no scheme), replacing
    /// any previous socket.  Events for the new socket are sent on `events`
    /// tagged with the returned id.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidAddress`] if the address is unusable.
    fn open(
        &mut self,
        address: &str,
        events: UnboundedSender<TransportEvent>,
    ) -> Result<ConnectionId, TransportError>;

    /// Queues one text frame on the current socket.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if there is no current socket.
    fn transmit(&mut self, frame: String) -> Result<(), TransportError>;

    /// Closes the current socket, if any.  Events that still arrive for it
    /// carry its old id.
    fn close(&mut self);
}
