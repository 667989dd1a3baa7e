//! Infrastructure layer for stacker-bridge.
//!
//! The infrastructure layer handles all I/O: opening the WebSocket to the
//! relay, moving text frames, and the reconnect timer.
//!
//! # Responsibilities
//!
//! - Opening and closing the relay socket ([`transport`])
//! - The connection state machine, dispatch loop, and reconnect policy
//!   ([`connection`])
//!
//! # What does NOT belong here?
//!
//! - What to do with a message (that is the application layer)
//! - Envelope and payload formats (that is `stacker-core`)
//! - Configuration parsing (that is done in `main.rs` and `domain::settings`)

pub mod connection;
pub mod transport;

pub use connection::ConnectionManager;
pub use transport::{
    RecordingTransport, Transport, TransportError, TransportEvent, WebSocketTransport,
};
