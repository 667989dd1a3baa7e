//! Connection identity and lifecycle state.
//!
//! # Why connection ids? (for beginners)
//!
//! The WebSocket reader runs in its own task and reports what it sees through
//! a channel.  When the bridge reconnects, events from the *previous* socket
//! may still be sitting in that channel.  Every socket therefore gets a fresh
//! [`ConnectionId`], each event carries the id of the socket that produced
//! it, and the connection manager ignores events whose id is not the current
//! one.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle of the single relay connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket, or the last one closed.
    Disconnected,
    /// A socket is being established.
    Connecting,
    /// The socket is open; outbound frames are transmitted.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        })
    }
}

/// Identifies one socket opened by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Hands out [`ConnectionId`]s in increasing order.
///
/// # Examples
///
/// ```rust
/// use stacker_bridge::domain::{ConnectionId, ConnectionIdGenerator};
///
/// let ids = ConnectionIdGenerator::new();
/// assert_eq!(ids.next(), ConnectionId(1));
/// assert_eq!(ids.next(), ConnectionId(2));
/// ```
#[derive(Debug)]
pub struct ConnectionIdGenerator {
    inner: AtomicU64,
}

impl ConnectionIdGenerator {
    /// Creates a generator whose first id is 1.
    pub fn new() -> Self {
        Self {
            inner: AtomicU64::new(1),
        }
    }

    /// Returns the next id.
    ///
    /// `Ordering::Relaxed` is enough: ids only need to be unique, they do not
    /// synchronise memory between threads.
    pub fn next(&self) -> ConnectionId {
        ConnectionId(self.inner.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
