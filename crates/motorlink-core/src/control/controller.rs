//! Motor controller
//!
//! The query and command surface offered to presentation code. Every method
//! is safe to call from any thread; commands block at most for one bounded
//! write.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

use super::clock::{format_elapsed, RunClock, RunState};
use crate::liveness::{ConnectivityState, LivenessMonitor};
use crate::protocol::{
    Command, LinkError, LinkState, LinkStats, LinkWriter, Mode, MotorChannel, RunCommand,
};
use crate::telemetry::{Sample, SampleSlot, SampleView};

/// Why a command was not sent
#[derive(Error, Debug)]
pub enum CommandError {
    /// The link refused or failed the write
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Setpoint text is not a finite real number
    #[error("Invalid setpoint '{0}': expected a real number")]
    InvalidSetpoint(String),

    /// Command not accepted in the current mode
    #[error("{command} is not available in {mode} mode")]
    WrongMode {
        /// Rejected command
        command: &'static str,
        /// Mode at the time
        mode: Mode,
    },
}

#[derive(Debug, Default)]
struct ControlState {
    mode: Mode,
    clock: RunClock,
}

/// Snapshot of everything a display needs
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Whether the port handle is open
    pub link: LinkState,
    /// Liveness verdict
    pub connectivity: ConnectivityState,
    /// Last mode successfully sent
    pub mode: Mode,
    /// Auto program state
    pub run_state: RunState,
    /// Elapsed run time in milliseconds
    pub elapsed_ms: u64,
    /// Elapsed run time as `MM:SS.cc`
    pub elapsed: String,
    /// Latest sample, if any
    pub sample: Option<SampleView>,
    /// Link counters
    pub stats: LinkStats,
}

/// Cloneable handle for querying telemetry and issuing commands
#[derive(Clone)]
pub struct MotorController {
    writer: LinkWriter,
    samples: SampleSlot,
    liveness: Arc<LivenessMonitor>,
    control: Arc<Mutex<ControlState>>,
}

impl MotorController {
    /// Controller in Auto mode with an idle clock
    pub fn new(writer: LinkWriter, samples: SampleSlot, liveness: Arc<LivenessMonitor>) -> Self {
        Self {
            writer,
            samples,
            liveness,
            control: Arc::new(Mutex::new(ControlState::default())),
        }
    }

    fn control(&self) -> MutexGuard<'_, ControlState> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Most recent sample, if any has arrived
    pub fn current_sample(&self) -> Option<Sample> {
        self.samples.current()
    }

    /// Liveness verdict evaluated now
    pub fn connectivity_state(&self) -> ConnectivityState {
        self.liveness.evaluate_at(Instant::now())
    }

    /// Whether the port handle is open
    pub fn link_state(&self) -> LinkState {
        self.writer.state()
    }

    /// Last mode successfully sent
    pub fn mode(&self) -> Mode {
        self.control().mode
    }

    /// Auto program state
    pub fn run_state(&self) -> RunState {
        self.control().clock.state()
    }

    /// Elapsed auto-mode run time
    pub fn elapsed_run_time(&self) -> Duration {
        self.control().clock.elapsed(Instant::now())
    }

    /// Link counters
    pub fn stats(&self) -> LinkStats {
        self.writer.stats()
    }

    /// Monitor shared with the liveness scheduler
    pub fn liveness(&self) -> &Arc<LivenessMonitor> {
        &self.liveness
    }

    /// Switch the device mode. The local mode changes only once sent.
    pub fn issue_mode_switch(&self, mode: Mode) -> Result<(), CommandError> {
        let mut control = self.control();
        self.send(Command::ModeSwitch(mode))?;
        control.mode = mode;
        Ok(())
    }

    /// Toggle the auto program; returns the new run state
    pub fn issue_start_stop(&self) -> Result<RunState, CommandError> {
        let mut control = self.control();
        if control.mode != Mode::Auto {
            return Err(CommandError::WrongMode {
                command: "start/stop",
                mode: control.mode,
            });
        }

        let now = Instant::now();
        match control.clock.state() {
            RunState::Idle => {
                self.send(Command::Run(RunCommand::Start))?;
                control.clock.start(now);
            }
            RunState::Running => {
                self.send(Command::Run(RunCommand::Stop))?;
                control.clock.stop(now);
            }
        }
        Ok(control.clock.state())
    }

    /// Send a setpoint to one motor channel (Manual mode only)
    pub fn issue_setpoint(&self, channel: MotorChannel, value: f64) -> Result<(), CommandError> {
        if !value.is_finite() {
            return Err(CommandError::InvalidSetpoint(value.to_string()));
        }
        let control = self.control();
        if control.mode != Mode::Manual {
            return Err(CommandError::WrongMode {
                command: "setpoint",
                mode: control.mode,
            });
        }
        self.send(Command::Setpoint { channel, value })
    }

    /// Validate user-entered text as a real number and send it as a setpoint
    pub fn issue_setpoint_text(&self, channel: MotorChannel, text: &str) -> Result<(), CommandError> {
        let value = text
            .trim()
            .parse::<f64>()
            .map_err(|_| CommandError::InvalidSetpoint(text.to_string()))?;
        if !value.is_finite() {
            return Err(CommandError::InvalidSetpoint(text.to_string()));
        }
        self.issue_setpoint(channel, value)
    }

    /// Everything a display needs, captured at one instant
    pub fn status(&self) -> StatusReport {
        let now = Instant::now();
        let (mode, run_state, elapsed) = {
            let control = self.control();
            (control.mode, control.clock.state(), control.clock.elapsed(now))
        };
        StatusReport {
            link: self.link_state(),
            connectivity: self.liveness.evaluate_at(now),
            mode,
            run_state,
            elapsed_ms: elapsed.as_millis() as u64,
            elapsed: format_elapsed(elapsed),
            sample: self.samples.current().map(|s| s.view(now)),
            stats: self.stats(),
        }
    }

    fn send(&self, command: Command) -> Result<(), CommandError> {
        self.writer.write(&command.encode()).map_err(|e| {
            tracing::warn!("command {command:?} not sent: {e}");
            CommandError::from(e)
        })
    }
}
