//! Link session
//!
//! Owns the physical connection: open, bounded line reads, command writes,
//! and release. The handle is split on open so that commands can be written
//! from any thread through a [`LinkWriter`] while the supervisor thread
//! keeps the read half.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::{CommunicationChannel, Connector, LinkCounters, LinkError, LinkStats, MAX_LINE_LENGTH};

const READ_CHUNK: usize = 256;

/// Whether the physical handle is currently usable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    /// No handle held
    Closed,
    /// Handle held; writes reach the device
    Open,
}

/// Result of a bounded read
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// One complete line, newline (and trailing CR) stripped
    Line {
        /// Line contents
        text: String,
        /// Arrival time
        received_at: Instant,
    },
    /// Nothing complete arrived within the read timeout
    Timeout,
}

/// Connection parameters for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    /// Platform device path or name
    pub port: String,
    /// Fixed baud rate
    pub baud_rate: u32,
    /// Upper bound on a single read
    pub read_timeout: Duration,
}

type SharedHandle = Arc<Mutex<Option<Box<dyn CommunicationChannel>>>>;

/// Cloneable write half of a session
///
/// The link counts as open exactly while this half holds a handle.
#[derive(Clone)]
pub struct LinkWriter {
    handle: SharedHandle,
    counters: Arc<LinkCounters>,
}

impl LinkWriter {
    fn new(counters: Arc<LinkCounters>) -> Self {
        Self {
            handle: Arc::new(Mutex::new(None)),
            counters,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn CommunicationChannel>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current link state
    pub fn state(&self) -> LinkState {
        if self.lock().is_some() {
            LinkState::Open
        } else {
            LinkState::Closed
        }
    }

    /// Write all bytes to the device.
    ///
    /// Fails with `NotOpen` without touching the wire when the link is
    /// closed. An I/O error closes the write half and yields `WriteFault`.
    pub fn write(&self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut guard = self.lock();
        let channel = guard.as_mut().ok_or(LinkError::NotOpen)?;

        match channel.write_all(bytes).and_then(|_| channel.flush()) {
            Ok(()) => {
                self.counters.add_tx(bytes.len());
                tracing::debug!("sent {:?}", String::from_utf8_lossy(bytes).trim_end());
                Ok(())
            }
            Err(e) => {
                *guard = None;
                self.counters.write_fault();
                tracing::warn!("write failed, closing link: {e}");
                Err(LinkError::WriteFault(e))
            }
        }
    }

    /// Link counters shared with the session
    pub fn stats(&self) -> LinkStats {
        self.counters.snapshot()
    }

    fn install(&self, channel: Box<dyn CommunicationChannel>) {
        *self.lock() = Some(channel);
    }

    fn release(&self) -> bool {
        self.lock().take().is_some()
    }
}

/// A connection to the motor driver, holding at most one handle at a time
pub struct LinkSession {
    connector: Box<dyn Connector>,
    settings: LinkSettings,
    reader: Option<Box<dyn CommunicationChannel>>,
    writer: LinkWriter,
    buffer: Vec<u8>,
    counters: Arc<LinkCounters>,
}

impl LinkSession {
    /// Create a closed session
    pub fn new(connector: Box<dyn Connector>, settings: LinkSettings) -> Self {
        let counters = Arc::new(LinkCounters::default());
        Self {
            connector,
            settings,
            reader: None,
            writer: LinkWriter::new(Arc::clone(&counters)),
            buffer: Vec::with_capacity(MAX_LINE_LENGTH),
            counters,
        }
    }

    /// Connection parameters
    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// Handle for writing commands from other threads
    pub fn writer(&self) -> LinkWriter {
        self.writer.clone()
    }

    /// Shared counters
    pub fn counters(&self) -> Arc<LinkCounters> {
        Arc::clone(&self.counters)
    }

    /// Current link state
    pub fn state(&self) -> LinkState {
        self.writer.state()
    }

    /// Snapshot of the link counters
    pub fn stats(&self) -> LinkStats {
        self.counters.snapshot()
    }

    /// Acquire the physical connection.
    ///
    /// Any previous handle is released first. On failure the session stays
    /// closed and `PortUnavailable` is returned.
    pub fn open(&mut self) -> Result<(), LinkError> {
        self.close();

        let LinkSettings {
            port,
            baud_rate,
            read_timeout,
        } = &self.settings;

        let reader = self.connector.open(port, *baud_rate, *read_timeout)?;
        let writer = reader.try_clone().map_err(|e| LinkError::PortUnavailable {
            port: port.clone(),
            reason: format!("cannot split handle: {e}"),
        })?;

        self.reader = Some(reader);
        self.writer.install(writer);
        self.counters.opened();
        tracing::info!("link open on {port} at {baud_rate} baud");
        Ok(())
    }

    /// Wait a bounded interval for one complete line
    pub fn read_line(&mut self) -> Result<ReadOutcome, LinkError> {
        if let Some(line) = self.take_buffered_line() {
            return Ok(line);
        }

        // A write fault drops the write half; the read half goes with it
        if self.reader.is_some() && self.writer.state() == LinkState::Closed {
            self.close();
        }
        let reader = self.reader.as_mut().ok_or(LinkError::NotOpen)?;

        let mut chunk = [0u8; READ_CHUNK];
        match reader.read(&mut chunk) {
            Ok(0) => Ok(ReadOutcome::Timeout),
            Ok(n) => {
                self.counters.add_rx(n);
                self.buffer.extend_from_slice(&chunk[..n]);
                Ok(self.take_buffered_line().unwrap_or(ReadOutcome::Timeout))
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                Ok(ReadOutcome::Timeout)
            }
            Err(e) => {
                tracing::warn!("connection lost on {}: {e}", self.settings.port);
                self.counters.lost();
                self.close();
                Err(LinkError::ConnectionLost(e))
            }
        }
    }

    /// Write bytes through the session's write half
    pub fn write(&self, bytes: &[u8]) -> Result<(), LinkError> {
        self.writer.write(bytes)
    }

    /// Release the physical handle. Safe to call when already closed.
    pub fn close(&mut self) {
        let had_reader = self.reader.take().is_some();
        let had_writer = self.writer.release();
        self.buffer.clear();
        if had_reader || had_writer {
            tracing::info!("link closed on {}", self.settings.port);
        }
    }

    fn take_buffered_line(&mut self) -> Option<ReadOutcome> {
        match self.buffer.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
                let text = String::from_utf8_lossy(&raw[..pos])
                    .trim_end_matches('\r')
                    .to_string();
                self.counters.line();
                Some(ReadOutcome::Line {
                    text,
                    received_at: Instant::now(),
                })
            }
            None => {
                if self.buffer.len() > MAX_LINE_LENGTH {
                    tracing::warn!(
                        "discarding {} bytes without a line terminator",
                        self.buffer.len()
                    );
                    self.buffer.clear();
                }
                None
            }
        }
    }
}

impl Drop for LinkSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MemoryPort;
    use std::io;

    fn session(port: &MemoryPort) -> LinkSession {
        LinkSession::new(
            Box::new(port.connector()),
            LinkSettings {
                port: "mem0".to_string(),
                baud_rate: 115200,
                read_timeout: Duration::from_millis(5),
            },
        )
    }

    fn expect_line(outcome: ReadOutcome) -> String {
        match outcome {
            ReadOutcome::Line { text, .. } => text,
            ReadOutcome::Timeout => panic!("Expected a line, got timeout"),
        }
    }

    #[test]
    fn test_new_session_is_closed() {
        let port = MemoryPort::new();
        let s = session(&port);
        assert_eq!(s.state(), LinkState::Closed);
        assert_eq!(s.stats().opens, 0);
    }

    #[test]
    fn test_open_failure_leaves_session_closed() {
        let port = MemoryPort::new();
        port.set_available(false);
        let mut s = session(&port);
        let err = s.open().unwrap_err();
        assert!(matches!(err, LinkError::PortUnavailable { .. }));
        assert_eq!(s.state(), LinkState::Closed);
    }

    #[test]
    fn test_read_line_and_timeout() {
        let port = MemoryPort::new();
        let mut s = session(&port);
        s.open().unwrap();
        assert_eq!(s.state(), LinkState::Open);

        assert_eq!(s.read_line().unwrap(), ReadOutcome::Timeout);

        port.push_line("200.5,300.35,1000.2\r");
        assert_eq!(expect_line(s.read_line().unwrap()), "200.5,300.35,1000.2");
    }

    #[test]
    fn test_partial_lines_are_reassembled() {
        let port = MemoryPort::new();
        let mut s = session(&port);
        s.open().unwrap();

        port.push_bytes(b"1.0,2.");
        assert_eq!(s.read_line().unwrap(), ReadOutcome::Timeout);
        port.push_bytes(b"0,3.0\n4,5,6\n");
        assert_eq!(expect_line(s.read_line().unwrap()), "1.0,2.0,3.0");
        assert_eq!(expect_line(s.read_line().unwrap()), "4,5,6");
        assert_eq!(s.stats().lines, 2);
    }

    #[test]
    fn test_overlong_garbage_is_dropped() {
        let port = MemoryPort::new();
        let mut s = session(&port);
        s.open().unwrap();

        port.push_bytes(&[b'x'; MAX_LINE_LENGTH + 1]);
        assert_eq!(s.read_line().unwrap(), ReadOutcome::Timeout);
        assert_eq!(s.read_line().unwrap(), ReadOutcome::Timeout);

        port.push_line("7,8,9");
        assert_eq!(expect_line(s.read_line().unwrap()), "7,8,9");
    }

    #[test]
    fn test_read_fault_closes_link() {
        let port = MemoryPort::new();
        let mut s = session(&port);
        s.open().unwrap();

        port.inject_read_fault(io::ErrorKind::BrokenPipe);
        let err = s.read_line().unwrap_err();
        assert!(matches!(err, LinkError::ConnectionLost(_)));
        assert_eq!(s.state(), LinkState::Closed);
        assert!(matches!(s.read_line(), Err(LinkError::NotOpen)));
        assert_eq!(s.stats().losses, 1);
    }

    #[test]
    fn test_write_while_closed_is_rejected() {
        let port = MemoryPort::new();
        let s = session(&port);
        let err = s.write(b"START\n").unwrap_err();
        assert!(matches!(err, LinkError::NotOpen));
        assert!(port.take_written().is_empty());
    }

    #[test]
    fn test_write_reaches_device() {
        let port = MemoryPort::new();
        let mut s = session(&port);
        s.open().unwrap();
        s.writer().write(b"MODE-M\n").unwrap();
        assert_eq!(port.take_written(), b"MODE-M\n".to_vec());
        assert_eq!(s.stats().tx_bytes, 7);
    }

    #[test]
    fn test_write_fault_closes_both_halves() {
        let port = MemoryPort::new();
        let mut s = session(&port);
        s.open().unwrap();

        port.inject_write_fault(io::ErrorKind::BrokenPipe);
        let err = s.write(b"STOP\n").unwrap_err();
        assert!(matches!(err, LinkError::WriteFault(_)));
        assert_eq!(s.state(), LinkState::Closed);
        assert!(matches!(s.read_line(), Err(LinkError::NotOpen)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let port = MemoryPort::new();
        let mut s = session(&port);
        s.open().unwrap();
        s.close();
        s.close();
        assert_eq!(s.state(), LinkState::Closed);
        s.open().unwrap();
        assert_eq!(s.state(), LinkState::Open);
        assert_eq!(port.opens(), 2);
    }
}
