//! Application layer for stacker-bridge.
//!
//! The application layer decides *what* happens when a message arrives, but
//! delegates *how* frames travel to the infrastructure layer.
//!
//! # Responsibilities
//!
//! - Routing inbound messages by effective key ([`dispatch`])
//! - The operator-side handlers and intents ([`controller`])
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or scheduling reconnects (that is infrastructure)
//! - Envelope encoding (that is `stacker-core`)

pub mod controller;
pub mod dispatch;

pub use controller::{Controller, ControllerState, Intent};
pub use dispatch::{DispatchKey, DispatchRegistry, Dispatched, Handler, Outbox};
