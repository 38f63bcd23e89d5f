//! Link counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative link counters, shared between the reader and writer halves
#[derive(Debug, Default)]
pub struct LinkCounters {
    rx_bytes: AtomicU64,
    tx_bytes: AtomicU64,
    lines: AtomicU64,
    samples: AtomicU64,
    rejected: AtomicU64,
    opens: AtomicU64,
    losses: AtomicU64,
    write_faults: AtomicU64,
}

impl LinkCounters {
    pub(crate) fn add_rx(&self, n: usize) {
        self.rx_bytes.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn add_tx(&self, n: usize) {
        self.tx_bytes.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn line(&self) {
        self.lines.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sample(&self) {
        self.samples.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn opened(&self) {
        self.opens.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn lost(&self) {
        self.losses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn write_fault(&self) {
        self.write_faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> LinkStats {
        LinkStats {
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            lines: self.lines.load(Ordering::Relaxed),
            samples: self.samples.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            opens: self.opens.load(Ordering::Relaxed),
            losses: self.losses.load(Ordering::Relaxed),
            write_faults: self.write_faults.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`LinkCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Bytes read from the device
    pub rx_bytes: u64,
    /// Bytes written to the device
    pub tx_bytes: u64,
    /// Complete lines received
    pub lines: u64,
    /// Lines decoded into samples
    pub samples: u64,
    /// Lines discarded by the decoder
    pub rejected: u64,
    /// Successful opens
    pub opens: u64,
    /// Mid-stream connection losses
    pub losses: u64,
    /// Failed command writes
    pub write_faults: u64,
}
