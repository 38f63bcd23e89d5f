//! Byte channels and the connectors that open them

use serialport::{ClearBuffer, SerialPort};
use std::fmt;
use std::io::{self, Read, Write};
use std::time::Duration;

use super::{
    serial::{configure_port, open_port},
    LinkError,
};

/// Abstraction over the physical link (serial port or in-memory stand-in)
pub trait CommunicationChannel: Read + Write + Send {
    /// Set the bounded timeout for reads
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Discard anything buffered on the input side
    fn clear_input_buffer(&mut self) -> io::Result<()>;

    /// Obtain a second handle to the same link (used for the writer half)
    fn try_clone(&self) -> io::Result<Box<dyn CommunicationChannel>>;
}

/// Opens communication channels on demand
pub trait Connector: Send {
    /// Acquire a channel for `port` at `baud_rate` with the given read timeout
    fn open(
        &mut self,
        port: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn CommunicationChannel>, LinkError>;
}

/// A configured serial port to the motor driver
pub struct SerialChannel {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Open `name` at `baud_rate` as 8N1 and drop anything already buffered
    pub fn open(name: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self, LinkError> {
        let mut port = open_port(name, baud_rate, read_timeout)?;
        configure_port(port.as_mut()).map_err(|e| LinkError::PortUnavailable {
            port: name.to_string(),
            reason: e.to_string(),
        })?;

        let mut channel = Self {
            name: name.to_string(),
            port,
        };
        // Stale bytes from before the open would produce a torn first line
        if let Err(e) = channel.clear_input_buffer() {
            tracing::debug!("failed to clear input buffer on {name}: {e}");
        }
        Ok(channel)
    }

    /// Device path or name this channel was opened on
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for SerialChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialChannel").field("name", &self.name).finish()
    }
}

impl Read for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

// serialport maps its error kinds onto io kinds (NoDevice -> NotFound, ...)
impl CommunicationChannel for SerialChannel {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        Ok(self.port.set_timeout(timeout)?)
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        Ok(self.port.clear(ClearBuffer::Input)?)
    }

    fn try_clone(&self) -> io::Result<Box<dyn CommunicationChannel>> {
        Ok(Box::new(SerialChannel {
            name: self.name.clone(),
            port: self.port.try_clone()?,
        }))
    }
}

/// Connector for real serial hardware
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    fn open(
        &mut self,
        port: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn CommunicationChannel>, LinkError> {
        let channel = SerialChannel::open(port, baud_rate, read_timeout)?;
        tracing::debug!("opened {:?}", channel);
        Ok(Box::new(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_reports_missing_port() {
        let name = "/dev/motorlink-does-not-exist";
        match SerialConnector.open(name, 115200, Duration::from_millis(10)) {
            Err(LinkError::PortUnavailable { port, .. }) => assert_eq!(port, name),
            Err(other) => panic!("Expected PortUnavailable, got {other:?}"),
            Ok(_) => panic!("Expected {name} to be missing"),
        }
    }
}
