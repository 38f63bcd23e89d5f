//! Operator control
//!
//! Mode and run-state tracking plus the command surface used by displays.

mod clock;
mod controller;

pub use clock::{format_elapsed, RunClock, RunState};
pub use controller::{CommandError, MotorController, StatusReport};
