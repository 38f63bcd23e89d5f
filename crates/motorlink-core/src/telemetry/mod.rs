//! Telemetry
//!
//! Samples reported by the motor driver and the single slot that holds the
//! most recent one.

mod decoder;
mod slot;

pub use decoder::{decode, FIELD_DELIMITER, MIN_FIELDS};
pub use slot::SampleSlot;

use serde::Serialize;
use std::time::{Duration, Instant};

/// One decoded telemetry reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Left motor speed (mm/s)
    pub left_speed: f64,
    /// Right motor speed (mm/s)
    pub right_speed: f64,
    /// Distance travelled (mm)
    pub distance: f64,
    /// When the line carrying this sample arrived
    pub received_at: Instant,
}

impl Sample {
    /// Time since the sample arrived, as seen at `now`
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.received_at)
    }

    /// Serializable view of the sample
    pub fn view(&self, now: Instant) -> SampleView {
        SampleView {
            left_speed: self.left_speed,
            right_speed: self.right_speed,
            distance: self.distance,
            age_ms: self.age(now).as_millis() as u64,
        }
    }
}

/// Sample values with the arrival time expressed as an age
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleView {
    /// Left motor speed (mm/s)
    pub left_speed: f64,
    /// Right motor speed (mm/s)
    pub right_speed: f64,
    /// Distance travelled (mm)
    pub distance: f64,
    /// Milliseconds since the sample arrived
    pub age_ms: u64,
}
