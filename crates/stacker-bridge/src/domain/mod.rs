//! Domain layer for stacker-bridge.
//!
//! The domain layer contains plain types with no dependencies on networking
//! or the async runtime.  The only I/O here is reading the settings file.
//!
//! # What belongs in the domain layer?
//!
//! - Runtime configuration and the optional settings file schema
//! - Connection identity and lifecycle state
//!
//! # What does NOT belong here?
//!
//! - Any `tokio` or `WebSocket` types
//! - Message handling (that is the application layer)

pub mod config;
pub mod session;
pub mod settings;

pub use config::BridgeConfig;
pub use session::{ConnectionId, ConnectionIdGenerator, ConnectionState};
pub use settings::{Settings, SettingsError};
