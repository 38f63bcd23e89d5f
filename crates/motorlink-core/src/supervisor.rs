//! Session supervisor
//!
//! Background loop that keeps the link session alive: open with backoff,
//! read and decode lines into the sample slot, reopen after a connection
//! loss, and release the port once a stop is requested.

use serde::Serialize;
use std::io;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::protocol::{LinkCounters, LinkSession, LinkState, ReadOutcome};
use crate::telemetry::{decode, SampleSlot};

/// Delay between failed open attempts in the reference firmware setup
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Produces the wait between consecutive failed open attempts
pub trait Backoff: Send {
    /// Delay before the next attempt after a failure
    fn next_delay(&mut self) -> Duration;

    /// Called after a successful open
    fn reset(&mut self);
}

/// Always waits the same amount
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    /// Wait `delay` after every failure
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for FixedBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_BACKOFF)
    }
}

impl Backoff for FixedBackoff {
    fn next_delay(&mut self) -> Duration {
        self.delay
    }

    fn reset(&mut self) {}
}

/// Doubles the delay after every failure up to a cap
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl ExponentialBackoff {
    /// Start at `initial`, doubling up to `max`
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = max.max(initial);
        Self {
            initial,
            max,
            current: initial,
        }
    }
}

impl Backoff for ExponentialBackoff {
    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Shared shutdown request, observable from any thread
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    /// A signal that has not been raised
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown and wake any waiter
    pub fn stop(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep up to `timeout`, returning early (with `true`) on a stop request
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut stopped = flag.lock().unwrap_or_else(PoisonError::into_inner);
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            stopped = cvar
                .wait_timeout(stopped, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *stopped
    }
}

/// Supervisor state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SupervisorState {
    /// No handle; the next step attempts an open
    Closed,
    /// Open attempt in progress
    Opening,
    /// Handle open, polling for lines
    Reading,
    /// Shut down; the port has been released
    Stopped,
}

/// Drives a [`LinkSession`] until stopped
pub struct Supervisor {
    session: LinkSession,
    samples: SampleSlot,
    backoff: Box<dyn Backoff>,
    stop: StopSignal,
    counters: Arc<LinkCounters>,
    state: SupervisorState,
}

impl Supervisor {
    /// Supervisor for a closed `session`, publishing into `samples`
    pub fn new(session: LinkSession, samples: SampleSlot, backoff: Box<dyn Backoff>) -> Self {
        let counters = session.counters();
        Self {
            session,
            samples,
            backoff,
            stop: StopSignal::new(),
            counters,
            state: SupervisorState::Closed,
        }
    }

    /// Signal that stops this supervisor
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Current position in the state machine
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// State of the underlying link
    pub fn link_state(&self) -> LinkState {
        self.session.state()
    }

    /// Run one iteration of the loop and return the resulting state
    pub fn step(&mut self) -> SupervisorState {
        if self.stop.is_stopped() {
            if self.state != SupervisorState::Stopped {
                self.session.close();
                self.state = SupervisorState::Stopped;
                tracing::info!("supervisor stopped");
            }
            return self.state;
        }

        match self.state {
            SupervisorState::Closed | SupervisorState::Opening => self.try_open(),
            SupervisorState::Reading => self.poll_line(),
            SupervisorState::Stopped => {}
        }
        self.state
    }

    /// Loop until a stop is requested
    pub fn run(mut self) {
        while self.step() != SupervisorState::Stopped {}
    }

    /// Run the loop on a dedicated thread
    pub fn spawn(self) -> io::Result<SupervisorHandle> {
        let stop = self.stop_signal();
        let thread = thread::Builder::new()
            .name("motorlink-supervisor".to_string())
            .spawn(move || self.run())?;
        Ok(SupervisorHandle {
            stop,
            thread: Some(thread),
        })
    }

    fn try_open(&mut self) {
        self.state = SupervisorState::Opening;
        match self.session.open() {
            Ok(()) => {
                self.backoff.reset();
                self.state = SupervisorState::Reading;
            }
            Err(e) => {
                self.state = SupervisorState::Closed;
                let delay = self.backoff.next_delay();
                tracing::warn!("{e}; retrying in {} ms", delay.as_millis());
                // A stop during the wait is picked up by the next step
                self.stop.wait_timeout(delay);
            }
        }
    }

    fn poll_line(&mut self) {
        match self.session.read_line() {
            Ok(ReadOutcome::Timeout) => {}
            Ok(ReadOutcome::Line { text, received_at }) => self.handle_line(&text, received_at),
            Err(e) => {
                tracing::debug!("leaving read state: {e}");
                self.state = SupervisorState::Closed;
            }
        }
    }

    fn handle_line(&mut self, text: &str, received_at: Instant) {
        match decode(text, received_at) {
            Ok(sample) => {
                self.samples.replace(sample);
                self.counters.sample();
                tracing::debug!(
                    "sample left={} right={} distance={}",
                    sample.left_speed,
                    sample.right_speed,
                    sample.distance
                );
            }
            Err(e) => {
                self.counters.rejected();
                tracing::warn!("discarding line {text:?}: {e}");
            }
        }
    }
}

/// Owner of a running supervisor thread
pub struct SupervisorHandle {
    stop: StopSignal,
    thread: Option<JoinHandle<()>>,
}

impl SupervisorHandle {
    /// Signal that stops the supervisor
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Whether the thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Request a stop and wait for the port to be released
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("supervisor thread panicked");
            }
        }
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
