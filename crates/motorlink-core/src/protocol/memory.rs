//! In-memory serial port
//!
//! A [`MemoryPort`] plays the device side of a link: it feeds bytes to the
//! host, records what the host writes, and can be told to fail. The matching
//! [`MemoryConnector`] hands out channels to it. Used by the demo device and
//! by tests that need a scripted link without hardware.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::{CommunicationChannel, Connector, LinkError};

#[derive(Debug, Default)]
struct PortState {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    read_fault: Option<io::ErrorKind>,
    write_fault: Option<io::ErrorKind>,
    unavailable: bool,
    failing_opens: usize,
    open_attempts: usize,
    opens: usize,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<PortState>,
    readable: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PortState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Device side of an in-memory link
#[derive(Debug, Clone, Default)]
pub struct MemoryPort {
    shared: Arc<Shared>,
}

impl MemoryPort {
    /// An available port with nothing queued
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector that opens channels to this port
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector { port: self.clone() }
    }

    /// Queue raw bytes for the host to read
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.shared.lock().inbound.extend(bytes);
        self.shared.readable.notify_all();
    }

    /// Queue one newline-terminated line for the host to read
    pub fn push_line(&self, line: &str) {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        self.push_bytes(&bytes);
    }

    /// Drain everything the host has written so far
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.shared.lock().outbound)
    }

    /// Drain host writes and split them into lines (newlines stripped)
    pub fn take_written_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.take_written())
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Fail the next read with an I/O error of `kind`
    pub fn inject_read_fault(&self, kind: io::ErrorKind) {
        self.shared.lock().read_fault = Some(kind);
        self.shared.readable.notify_all();
    }

    /// Fail the next write with an I/O error of `kind`
    pub fn inject_write_fault(&self, kind: io::ErrorKind) {
        self.shared.lock().write_fault = Some(kind);
    }

    /// Make subsequent open attempts fail (or succeed again)
    pub fn set_available(&self, available: bool) {
        self.shared.lock().unavailable = !available;
    }

    /// Whether open attempts can currently succeed
    pub fn is_available(&self) -> bool {
        !self.shared.lock().unavailable
    }

    /// Fail exactly the next `count` open attempts
    pub fn fail_next_opens(&self, count: usize) {
        self.shared.lock().failing_opens = count;
    }

    /// Simulate the cable being pulled: reads fault and reopening fails
    pub fn unplug(&self) {
        {
            let mut state = self.shared.lock();
            state.unavailable = true;
            state.read_fault = Some(io::ErrorKind::BrokenPipe);
            state.inbound.clear();
        }
        self.shared.readable.notify_all();
    }

    /// Undo [`MemoryPort::unplug`]
    pub fn plug_in(&self) {
        self.set_available(true);
    }

    /// Number of open attempts seen by the connector
    pub fn open_attempts(&self) -> usize {
        self.shared.lock().open_attempts
    }

    /// Number of successful opens
    pub fn opens(&self) -> usize {
        self.shared.lock().opens
    }
}

/// Host side handle to a [`MemoryPort`]
pub struct MemoryChannel {
    shared: Arc<Shared>,
    timeout: Duration,
}

impl Read for MemoryChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let deadline = Instant::now() + self.timeout;
        let mut state = self.shared.lock();
        loop {
            if let Some(kind) = state.read_fault.take() {
                return Err(io::Error::new(kind, "injected read fault"));
            }
            if !state.inbound.is_empty() {
                let n = buf.len().min(state.inbound.len());
                for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
            }
            state = self
                .shared
                .readable
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

impl Write for MemoryChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.shared.lock();
        if let Some(kind) = state.write_fault.take() {
            return Err(io::Error::new(kind, "injected write fault"));
        }
        state.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CommunicationChannel for MemoryChannel {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.shared.lock().inbound.clear();
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Box<dyn CommunicationChannel>> {
        Ok(Box::new(MemoryChannel {
            shared: Arc::clone(&self.shared),
            timeout: self.timeout,
        }))
    }
}

/// Connector that opens channels to a [`MemoryPort`]
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    port: MemoryPort,
}

impl Connector for MemoryConnector {
    fn open(
        &mut self,
        port: &str,
        _baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn CommunicationChannel>, LinkError> {
        let mut state = self.port.shared.lock();
        state.open_attempts += 1;
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(LinkError::PortUnavailable {
                port: port.to_string(),
                reason: "scripted open failure".to_string(),
            });
        }
        if state.unavailable {
            return Err(LinkError::PortUnavailable {
                port: port.to_string(),
                reason: "device not present".to_string(),
            });
        }
        state.opens += 1;
        Ok(Box::new(MemoryChannel {
            shared: Arc::clone(&self.port.shared),
            timeout: read_timeout,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(port: &MemoryPort) -> Box<dyn CommunicationChannel> {
        port.connector()
            .open("mem", 115200, Duration::from_millis(5))
            .expect("memory port should open")
    }

    #[test]
    fn test_scripted_reads_and_writes() {
        let port = MemoryPort::new();
        let mut channel = open(&port);

        port.push_line("1,2,3");
        let mut buf = [0u8; 16];
        let n = channel.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"1,2,3\n");

        channel.write_all(b"START\n").unwrap();
        assert_eq!(port.take_written_lines(), vec!["START".to_string()]);
        assert!(port.take_written().is_empty());
    }

    #[test]
    fn test_read_times_out_when_idle() {
        let port = MemoryPort::new();
        let mut channel = open(&port);
        let mut buf = [0u8; 4];
        let err = channel.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_faults_are_one_shot() {
        let port = MemoryPort::new();
        let mut channel = open(&port);

        port.inject_write_fault(io::ErrorKind::BrokenPipe);
        assert!(channel.write(b"x").is_err());
        assert!(channel.write(b"x").is_ok());

        port.inject_read_fault(io::ErrorKind::BrokenPipe);
        let mut buf = [0u8; 4];
        assert_eq!(
            channel.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
    }

    #[test]
    fn test_open_failures() {
        let port = MemoryPort::new();
        let mut connector = port.connector();
        let timeout = Duration::from_millis(1);

        port.fail_next_opens(2);
        assert!(connector.open("mem", 9600, timeout).is_err());
        assert!(connector.open("mem", 9600, timeout).is_err());
        assert!(connector.open("mem", 9600, timeout).is_ok());

        port.unplug();
        assert!(!port.is_available());
        assert!(connector.open("mem", 9600, timeout).is_err());
        port.plug_in();
        assert!(port.is_available());
        assert!(connector.open("mem", 9600, timeout).is_ok());

        assert_eq!(port.open_attempts(), 5);
        assert_eq!(port.opens(), 2);
    }
}
