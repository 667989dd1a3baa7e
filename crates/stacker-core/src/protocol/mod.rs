//! Wire protocol: the JSON envelope codec and the typed messages carried in it.

pub mod commands;
pub mod device;
pub mod envelope;

pub use commands::{OutboundCommand, SerialRequest};
pub use device::{DeviceStatus, FirmwareVersion, InboundMessage, RepoState, StackState, SubState};
pub use envelope::{decode, effective_key, encode, Envelope, ProtocolError};
