//! Serial Link Protocol
//!
//! Newline-delimited ASCII link to the motor driver: command encoding,
//! port discovery, and the link session that owns the physical handle.

pub mod commands;
mod error;
pub mod memory;
pub mod serial;
mod session;
mod stats;
mod stream;

pub use commands::{encode, Command, Mode, MotorChannel, RunCommand};
pub use error::{DecodeError, LinkError};
pub use memory::{MemoryConnector, MemoryPort};
pub use serial::{list_ports, PortInfo};
pub use session::{LinkSession, LinkSettings, LinkState, LinkWriter, ReadOutcome};
pub use stats::{LinkCounters, LinkStats};
pub use stream::{CommunicationChannel, Connector, SerialChannel, SerialConnector};

/// Default baud rate of the motor driver firmware
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default bound on a single read in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 10;

/// Longest partial line kept while waiting for a terminator
pub const MAX_LINE_LENGTH: usize = 256;
