//! # MotorLink Core Library
//!
//! Core functionality for monitoring and controlling a motor driver board
//! over a serial link.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - A line-based telemetry decoder and command encoder
//! - A link session that owns the serial port (open, bounded reads, writes)
//! - A supervisor thread that keeps the link alive with retry/backoff
//! - A liveness monitor that tracks whether the device is still talking
//! - A controller exposing queries and commands to display code
//!
//! ## Example
//!
//! ```rust,ignore
//! use motorlink_core::{config::MonitorConfig, monitor::Monitor, protocol::SerialConnector};
//!
//! let config = MonitorConfig::default();
//! let monitor = Monitor::start(&config, Box::new(SerialConnector))?;
//!
//! let controller = monitor.controller();
//! controller.issue_start_stop()?;
//! if let Some(sample) = controller.current_sample() {
//!     println!("left={} right={}", sample.left_speed, sample.right_speed);
//! }
//! monitor.shutdown();
//! ```

pub mod config;
pub mod control;
pub mod demo;
pub mod liveness;
pub mod monitor;
pub mod protocol;
pub mod supervisor;
pub mod telemetry;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::MonitorConfig;
    pub use crate::control::{CommandError, MotorController, RunState, StatusReport};
    pub use crate::liveness::{ConnectivityState, LivenessMonitor};
    pub use crate::monitor::Monitor;
    pub use crate::protocol::{
        Command, LinkError, LinkState, Mode, MotorChannel, RunCommand, SerialConnector,
    };
    pub use crate::telemetry::Sample;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
