//! Latest-sample slot

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use super::Sample;

/// Holds the most recent sample; replaced whole on every update.
///
/// Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct SampleSlot {
    current: Arc<RwLock<Option<Sample>>>,
}

impl SampleSlot {
    /// An empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current sample
    pub fn replace(&self, sample: Sample) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(sample);
    }

    /// The current sample, if any has arrived
    pub fn current(&self) -> Option<Sample> {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arrival time of the current sample
    pub fn received_at(&self) -> Option<Instant> {
        self.current().map(|s| s.received_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::decode;
    use std::thread;

    #[test]
    fn test_empty_slot() {
        let slot = SampleSlot::new();
        assert!(slot.current().is_none());
        assert!(slot.received_at().is_none());
    }

    #[test]
    fn test_replace_overwrites() {
        let slot = SampleSlot::new();
        let first = decode("1,2,3", Instant::now()).unwrap();
        let second = decode("4,5,6", Instant::now()).unwrap();
        slot.replace(first);
        slot.replace(second);
        assert_eq!(slot.current(), Some(second));
    }

    #[test]
    fn test_readers_never_see_torn_samples() {
        let slot = SampleSlot::new();
        let writer = slot.clone();
        let handle = thread::spawn(move || {
            for i in 0..2000 {
                let v = i as f64;
                let line = format!("{v},{v},{v}");
                writer.replace(decode(&line, Instant::now()).unwrap());
            }
        });

        for _ in 0..2000 {
            if let Some(s) = slot.current() {
                assert_eq!(s.left_speed, s.right_speed);
                assert_eq!(s.right_speed, s.distance);
            }
        }
        handle.join().unwrap();
    }
}
