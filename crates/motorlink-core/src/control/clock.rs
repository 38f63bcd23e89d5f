//! Auto-mode run clock

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Auto-mode start/stop toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunState {
    /// Not running; elapsed time is frozen
    #[default]
    Idle,
    /// Auto program running; elapsed time advances
    Running,
}

/// Monotonic stopwatch behind [`RunState`].
///
/// Starting resets the elapsed time to zero; stopping freezes it.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunClock {
    started_at: Option<Instant>,
    frozen: Duration,
}

impl RunClock {
    /// An idle clock at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Running while started and not yet stopped
    pub fn state(&self) -> RunState {
        if self.started_at.is_some() {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    /// Start from zero at `now`
    pub fn start(&mut self, now: Instant) {
        self.started_at = Some(now);
        self.frozen = Duration::ZERO;
    }

    /// Freeze the elapsed time at `now`
    pub fn stop(&mut self, now: Instant) {
        if let Some(started) = self.started_at.take() {
            self.frozen = now.saturating_duration_since(started);
        }
    }

    /// Elapsed run time as seen at `now`
    pub fn elapsed(&self, now: Instant) -> Duration {
        match self.started_at {
            Some(started) => now.saturating_duration_since(started),
            None => self.frozen,
        }
    }
}

/// Render a duration as `MM:SS.cc` (minutes keep counting past 99)
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let centis = elapsed.subsec_millis() / 10;
    format!("{:02}:{:02}.{:02}", total_secs / 60, total_secs % 60, centis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clock_is_idle() {
        let clock = RunClock::new();
        assert_eq!(clock.state(), RunState::Idle);
        assert_eq!(clock.elapsed(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn test_start_stop_freezes_elapsed() {
        let t0 = Instant::now();
        let mut clock = RunClock::new();
        clock.start(t0);
        assert_eq!(clock.state(), RunState::Running);
        assert_eq!(
            clock.elapsed(t0 + Duration::from_millis(1500)),
            Duration::from_millis(1500)
        );

        clock.stop(t0 + Duration::from_secs(2));
        assert_eq!(clock.state(), RunState::Idle);
        assert_eq!(clock.elapsed(t0 + Duration::from_secs(60)), Duration::from_secs(2));
    }

    #[test]
    fn test_restart_resets_elapsed() {
        let t0 = Instant::now();
        let mut clock = RunClock::new();
        clock.start(t0);
        clock.stop(t0 + Duration::from_secs(5));
        clock.start(t0 + Duration::from_secs(10));
        assert_eq!(
            clock.elapsed(t0 + Duration::from_secs(11)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let mut clock = RunClock::new();
        clock.stop(Instant::now());
        assert_eq!(clock.state(), RunState::Idle);
        assert_eq!(clock.elapsed(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::ZERO), "00:00.00");
        assert_eq!(format_elapsed(Duration::from_millis(61_234)), "01:01.23");
        assert_eq!(format_elapsed(Duration::from_millis(599_999)), "09:59.99");
        assert_eq!(format_elapsed(Duration::from_secs(6000)), "100:00.00");
    }
}
