//! Liveness monitor
//!
//! Decides whether the device is actually talking, independently of whether
//! the port handle is open. The verdict depends only on how long ago the
//! last sample arrived.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::telemetry::SampleSlot;

/// Silence longer than this marks the device disconnected
pub const DEFAULT_DISCONNECT_THRESHOLD: Duration = Duration::from_millis(300);

/// How often the monitor is re-evaluated
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// User-visible liveness verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectivityState {
    /// A sample arrived within the threshold
    Connected,
    /// No sample yet, or silent for longer than the threshold
    Disconnected,
}

/// Classify liveness at `now`.
///
/// Connected iff a sample arrived no more than `threshold` ago; the boundary
/// is inclusive. With no sample yet the device counts as disconnected.
pub fn evaluate(
    now: Instant,
    last_sample: Option<Instant>,
    threshold: Duration,
) -> ConnectivityState {
    match last_sample {
        Some(at) if now.saturating_duration_since(at) <= threshold => {
            ConnectivityState::Connected
        }
        _ => ConnectivityState::Disconnected,
    }
}

/// Periodically re-evaluated liveness verdict
#[derive(Debug)]
pub struct LivenessMonitor {
    samples: SampleSlot,
    threshold: Duration,
    interval: Duration,
    verdict: Mutex<ConnectivityState>,
}

impl LivenessMonitor {
    /// Monitor over `samples`, starting out Disconnected
    pub fn new(samples: SampleSlot, threshold: Duration, interval: Duration) -> Self {
        Self {
            samples,
            threshold,
            interval,
            verdict: Mutex::new(ConnectivityState::Disconnected),
        }
    }

    /// Disconnect threshold
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Cadence at which [`LivenessMonitor::check`] should be driven
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Verdict published by the last check
    pub fn state(&self) -> ConnectivityState {
        *self.verdict.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fresh verdict at `now`, without publishing it
    pub fn evaluate_at(&self, now: Instant) -> ConnectivityState {
        evaluate(now, self.samples.received_at(), self.threshold)
    }

    /// Re-evaluate and publish. Returns the new verdict when it changed.
    pub fn check(&self, now: Instant) -> Option<ConnectivityState> {
        let next = self.evaluate_at(now);
        let mut verdict = self.verdict.lock().unwrap_or_else(PoisonError::into_inner);
        if *verdict == next {
            return None;
        }
        *verdict = next;
        match next {
            ConnectivityState::Connected => tracing::info!("device connected"),
            ConnectivityState::Disconnected => tracing::warn!(
                "device disconnected: no sample for more than {} ms",
                self.threshold.as_millis()
            ),
        }
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::decode;

    const THRESHOLD: Duration = Duration::from_millis(300);

    #[test]
    fn test_no_sample_is_disconnected() {
        assert_eq!(
            evaluate(Instant::now(), None, THRESHOLD),
            ConnectivityState::Disconnected
        );
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let last = Instant::now();
        assert_eq!(
            evaluate(last, Some(last), THRESHOLD),
            ConnectivityState::Connected
        );
        assert_eq!(
            evaluate(last + THRESHOLD, Some(last), THRESHOLD),
            ConnectivityState::Connected
        );
        assert_eq!(
            evaluate(
                last + THRESHOLD + Duration::from_millis(1),
                Some(last),
                THRESHOLD
            ),
            ConnectivityState::Disconnected
        );
    }

    #[test]
    fn test_sample_from_the_future_counts_as_fresh() {
        let now = Instant::now();
        assert_eq!(
            evaluate(now, Some(now + Duration::from_millis(5)), THRESHOLD),
            ConnectivityState::Connected
        );
    }

    #[test]
    fn test_check_reports_transitions_only() {
        let slot = SampleSlot::new();
        let monitor = LivenessMonitor::new(slot.clone(), THRESHOLD, DEFAULT_CHECK_INTERVAL);
        let t0 = Instant::now();

        assert_eq!(monitor.check(t0), None);
        assert_eq!(monitor.state(), ConnectivityState::Disconnected);

        slot.replace(decode("200.5,300.35,1000.2", t0).unwrap());
        assert_eq!(monitor.check(t0), Some(ConnectivityState::Connected));
        assert_eq!(monitor.check(t0 + Duration::from_millis(100)), None);

        let later = t0 + Duration::from_millis(400);
        assert_eq!(monitor.check(later), Some(ConnectivityState::Disconnected));
        assert_eq!(monitor.state(), ConnectivityState::Disconnected);
        // Going quiet never touches the sample itself
        assert_eq!(slot.current().map(|s| s.left_speed), Some(200.5));
    }
}
