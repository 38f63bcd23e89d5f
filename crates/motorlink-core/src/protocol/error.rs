//! Protocol errors

use thiserror::Error;

/// Errors raised by the link session
#[derive(Error, Debug)]
pub enum LinkError {
    /// The port could not be opened
    #[error("Port '{port}' unavailable: {reason}")]
    PortUnavailable {
        /// Port that was requested
        port: String,
        /// Why the open failed
        reason: String,
    },

    /// No handle is held; nothing was written
    #[error("Link is not open")]
    NotOpen,

    /// Writing a command failed; the link has been closed
    #[error("Write failed: {0}")]
    WriteFault(#[source] std::io::Error),

    /// The handle reported an I/O fault mid-stream
    #[error("Connection lost: {0}")]
    ConnectionLost(#[source] std::io::Error),
}

/// Errors produced while decoding a telemetry line
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Fewer than three fields
    #[error("Malformed line: expected at least 3 fields, found {found}")]
    MalformedLine {
        /// Number of fields present
        found: usize,
    },

    /// A field did not parse as a finite number
    #[error("Field {index} is not a number: '{value}'")]
    NonNumericField {
        /// Zero-based field position
        index: usize,
        /// Offending text
        value: String,
    },
}
