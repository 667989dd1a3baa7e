//! WebSocket client transport (tokio-tungstenite).
//!
//! Each call to [`WebSocketTransport::open`] spawns one Tokio task that owns
//! the socket for its whole life:
//!
//! ```text
//!              ┌──────────── socket task ─────────────┐
//! transmit() ─▶│ outgoing rx ─▶ sink.send(Text)        │
//!              │ stream.next() ─▶ TransportEvent ─────▶│─▶ events channel
//!              └───────────────────────────────────────┘
//! ```
//!
//! The task ends when the peer closes, on a socket error, or when the
//! transport drops its end of the outgoing channel (which sends a Close
//! frame first).  It always reports [`TransportEvent::Closed`] on the way
//! out, including when the connection attempt itself fails.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use super::{Transport, TransportError, TransportEvent};
use crate::domain::{ConnectionId, ConnectionIdGenerator};

/// URL scheme prepended to every address; the relay does not use TLS.
pub const SCHEME: &str = "ws://";

/// The socket currently owned by the transport.
#[derive(Debug)]
struct ActiveSocket {
    id: ConnectionId,
    outgoing: UnboundedSender<String>,
}

/// Real WebSocket client.  Must be used from within a Tokio runtime.
#[derive(Debug, Default)]
pub struct WebSocketTransport {
    ids: ConnectionIdGenerator,
    active: Option<ActiveSocket>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the client handshake request for `address`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidAddress`] if `ws://{address}` is not a
    /// valid URI.
    pub fn request_for(address: &str) -> Result<Request, TransportError> {
        format!("{SCHEME}{address}")
            .into_client_request()
            .map_err(|e| TransportError::InvalidAddress {
                address: address.to_string(),
                reason: e.to_string(),
            })
    }
}

impl Transport for WebSocketTransport {
    fn open(
        &mut self,
        address: &str,
        events: UnboundedSender<TransportEvent>,
    ) -> Result<ConnectionId, TransportError> {
        let request = Self::request_for(address)?;
        self.close();

        let id = self.ids.next();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        debug!(%id, uri = %request.uri(), "connecting");
        tokio::spawn(run_socket(id, request, outgoing_rx, events));

        self.active = Some(ActiveSocket { id, outgoing });
        Ok(id)
    }

    fn transmit(&mut self, frame: String) -> Result<(), TransportError> {
        let socket = self.active.as_ref().ok_or(TransportError::Closed)?;
        socket
            .outgoing
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) {
        if let Some(socket) = self.active.take() {
            // Dropping the sender tells the socket task to send a Close frame.
            debug!(id = %socket.id, "closing socket");
        }
    }
}

/// Owns one socket from connect to close.
async fn run_socket(
    id: ConnectionId,
    request: Request,
    mut outgoing: UnboundedReceiver<String>,
    events: UnboundedSender<TransportEvent>,
) {
    let ws_stream = match tokio_tungstenite::connect_async(request).await {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            warn!(%id, error = %e, "WebSocket connect failed");
            let _ = events.send(TransportEvent::Closed(id));
            return;
        }
    };

    info!(%id, "WebSocket connected");
    if events.send(TransportEvent::Opened(id)).is_err() {
        return;
    }

    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            frame = outgoing.recv() => match frame {
                Some(text) => {
                    if let Err(e) = sink.send(WsMessage::Text(text)).await {
                        warn!(%id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    break;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    if events.send(TransportEvent::Message(id, text)).is_err() {
                        break;
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!(%id, ?frame, "WebSocket close frame received");
                    break;
                }
                Some(Ok(_)) => {
                    // Binary, Ping, Pong, Frame: tungstenite answers pings itself.
                }
                Some(Err(e)) => {
                    warn!(%id, error = %e, "WebSocket read failed");
                    break;
                }
                None => break,
            },
        }
    }

    info!(%id, "WebSocket closed");
    let _ = events.send(TransportEvent::Closed(id));
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_for_prepends_scheme() {
        let request = WebSocketTransport::request_for("127.0.0.1:8080/ws").unwrap();
        assert_eq!(request.uri().to_string(), "ws://127.0.0.1:8080/ws");
    }

    #[test]
    fn test_request_for_rejects_invalid_address() {
        let result = WebSocketTransport::request_for("bad host:80/ws");
        assert!(matches!(result, Err(TransportError::InvalidAddress { .. })));
    }

    #[test]
    fn test_open_with_invalid_address_fails_synchronously() {
        // Arrange
        let mut transport = WebSocketTransport::new();
        let (events, mut rx) = mpsc::unbounded_channel();

        // Act: no runtime is needed because nothing is spawned on failure.
        let result = transport.open("bad host:80/ws", events);

        // Assert
        assert!(result.is_err());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_transmit_without_socket_is_closed() {
        let mut transport = WebSocketTransport::new();
        let result = transport.transmit("[\"x\",\"\"]".to_string());
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_unreachable_relay_reports_closed() {
        // Arrange: port 9 (discard) on loopback is normally closed.
        let mut transport = WebSocketTransport::new();
        let (events, mut rx) = mpsc::unbounded_channel();

        // Act
        let id = transport.open("127.0.0.1:9/ws", events).unwrap();

        // Assert
        assert_eq!(rx.recv().await, Some(TransportEvent::Closed(id)));
    }
}
