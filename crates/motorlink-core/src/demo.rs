//! Demo Mode - simulated motor driver for running without hardware
//!
//! Plays the firmware side of a [`MemoryPort`]: emits telemetry lines on a
//! fixed tick and reacts to the commands the host writes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::protocol::{Command, MemoryPort, Mode, MotorChannel, RunCommand};
use crate::supervisor::StopSignal;

/// Telemetry period of the reference firmware
pub const DEMO_TICK: Duration = Duration::from_millis(50);

/// Wheel speed the auto program cruises at (mm/s)
const CRUISE_SPEED: f64 = 200.0;

/// Fraction of the gap to the target speed closed per second
const RESPONSE_RATE: f64 = 4.0;

/// Simulated motor driver state
pub struct DemoDevice {
    mode: Mode,
    running: bool,
    left_target: f64,
    right_target: f64,
    left: f64,
    right: f64,
    distance: f64,
    rng: StdRng,
}

impl Default for DemoDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoDevice {
    /// Idle device in Auto mode
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic simulator for tests
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            mode: Mode::Auto,
            running: false,
            left_target: 0.0,
            right_target: 0.0,
            left: 0.0,
            right: 0.0,
            distance: 0.0,
            rng,
        }
    }

    /// Current device mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the auto program is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// React to one host command
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::ModeSwitch(mode) => {
                self.mode = mode;
                self.running = false;
                self.left_target = 0.0;
                self.right_target = 0.0;
            }
            Command::Run(RunCommand::Start) if self.mode == Mode::Auto => {
                self.running = true;
                self.distance = 0.0;
            }
            Command::Run(RunCommand::Stop) if self.mode == Mode::Auto => self.running = false,
            Command::Setpoint { channel, value } if self.mode == Mode::Manual => match channel {
                MotorChannel::Left => self.left_target = value,
                MotorChannel::Right => self.right_target = value,
            },
            other => tracing::debug!("demo device ignoring {other:?} in {} mode", self.mode),
        }
    }

    /// Advance the simulation by `dt` and render the telemetry line
    pub fn advance(&mut self, dt: Duration) -> String {
        let (left_target, right_target) = match self.mode {
            Mode::Auto if self.running => (
                CRUISE_SPEED + self.rng.gen_range(-5.0..5.0),
                CRUISE_SPEED + self.rng.gen_range(-5.0..5.0),
            ),
            Mode::Auto => (0.0, 0.0),
            Mode::Manual => (self.left_target, self.right_target),
        };

        let secs = dt.as_secs_f64();
        let k = (RESPONSE_RATE * secs).min(1.0);
        self.left += (left_target - self.left) * k;
        self.right += (right_target - self.right) * k;
        self.distance += (self.left + self.right) / 2.0 * secs;

        format!("{:.2},{:.2},{:.2}", self.left, self.right, self.distance)
    }

    /// Run the simulator against `port` on a background thread
    pub fn spawn(self, port: MemoryPort, tick: Duration) -> io::Result<DemoHandle> {
        let stop = StopSignal::new();
        let paused = Arc::new(AtomicBool::new(false));
        let thread = {
            let stop = stop.clone();
            let paused = Arc::clone(&paused);
            let port = port.clone();
            thread::Builder::new()
                .name("motorlink-demo".to_string())
                .spawn(move || self.run(port, tick, stop, paused))?
        };
        Ok(DemoHandle {
            port,
            stop,
            paused,
            thread: Some(thread),
        })
    }

    fn run(mut self, port: MemoryPort, tick: Duration, stop: StopSignal, paused: Arc<AtomicBool>) {
        let mut last = Instant::now();
        while !stop.wait_timeout(tick) {
            for line in port.take_written_lines() {
                match Command::parse_wire(&line) {
                    Some(command) => self.apply(command),
                    None => tracing::debug!("demo device ignoring {line:?}"),
                }
            }
            let now = Instant::now();
            let line = self.advance(now.duration_since(last));
            last = now;
            // Nothing travels over a pulled cable
            if !paused.load(Ordering::Relaxed) && port.is_available() {
                port.push_line(&line);
            }
        }
    }
}

/// Owner of a running demo device
pub struct DemoHandle {
    port: MemoryPort,
    stop: StopSignal,
    paused: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DemoHandle {
    /// Port the device is attached to
    pub fn port(&self) -> &MemoryPort {
        &self.port
    }

    /// Keep the port open but stop emitting telemetry
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    /// Whether telemetry is suppressed
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Stop the device thread and wait for it
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("demo device thread panicked");
            }
        }
    }
}

impl Drop for DemoHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
