//! stacker-bridge library crate.
//!
//! The operator side of the focus stacker: a WebSocket client that talks to
//! the relay, which in turn owns the serial link to the stacking device.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Relay (JSON envelopes over WebSocket)
//!         ↕
//! [stacker-bridge]
//!   ├── domain/           Pure types: BridgeConfig, Settings, ConnectionState
//!   ├── application/      Dispatch registry and the operator controller
//!   └── infrastructure/
//!         ├── transport/  WebSocket client (tokio-tungstenite) and a test double
//!         └── connection/ Connection state, dispatch loop, reconnect timer
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `stacker-core` only.  Handlers
//!   never touch the socket; they queue commands in an
//!   [`Outbox`](application::Outbox).
//! - `infrastructure` depends on all other layers plus `tokio` and `tungstenite`.
//!
//! # For beginners: why this structure?
//!
//! The handlers that react to device messages are plain functions over a
//! JSON payload.  Keeping them apart from the socket means every reaction can
//! be tested by calling [`DispatchRegistry::dispatch`](application::DispatchRegistry::dispatch)
//! directly, and the socket itself can be replaced with
//! [`RecordingTransport`](infrastructure::RecordingTransport) in tests.

/// Domain layer: configuration and connection identity types (no I/O).
pub mod domain;

/// Application layer: message routing and operator handlers.
pub mod application;

/// Infrastructure layer: relay socket and connection manager.
pub mod infrastructure;
