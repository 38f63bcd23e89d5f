//! Monitor assembly
//!
//! Wires the sample slot, link session, supervisor thread, liveness monitor
//! and controller together.

use std::io;
use std::sync::Arc;

use crate::config::MonitorConfig;
use crate::control::MotorController;
use crate::liveness::LivenessMonitor;
use crate::protocol::{Connector, LinkSession};
use crate::supervisor::{Backoff, Supervisor, SupervisorHandle};
use crate::telemetry::SampleSlot;

/// A running link: supervisor thread plus the handles to observe and command it
pub struct Monitor {
    controller: MotorController,
    supervisor: Option<SupervisorHandle>,
}

impl Monitor {
    /// Start supervising the link described by `config`
    pub fn start(config: &MonitorConfig, connector: Box<dyn Connector>) -> io::Result<Self> {
        Self::start_with_backoff(config, connector, config.backoff())
    }

    /// Like [`Monitor::start`] with an explicit retry strategy
    pub fn start_with_backoff(
        config: &MonitorConfig,
        connector: Box<dyn Connector>,
        backoff: Box<dyn Backoff>,
    ) -> io::Result<Self> {
        let samples = SampleSlot::new();
        let session = LinkSession::new(connector, config.link_settings());
        let liveness = Arc::new(LivenessMonitor::new(
            samples.clone(),
            config.disconnect_threshold(),
            config.liveness_interval(),
        ));
        let controller = MotorController::new(session.writer(), samples.clone(), liveness);

        tracing::info!(
            "supervising {} at {} baud",
            config.port,
            config.baud_rate
        );
        let supervisor = Supervisor::new(session, samples, backoff).spawn()?;

        Ok(Self {
            controller,
            supervisor: Some(supervisor),
        })
    }

    /// Query/command handle; clones share state
    pub fn controller(&self) -> &MotorController {
        &self.controller
    }

    /// Liveness monitor to drive on its own cadence
    pub fn liveness(&self) -> Arc<LivenessMonitor> {
        Arc::clone(self.controller.liveness())
    }

    /// Whether the supervisor thread is still alive
    pub fn is_running(&self) -> bool {
        self.supervisor
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the supervisor and release the port
    pub fn shutdown(mut self) {
        if let Some(handle) = self.supervisor.take() {
            handle.shutdown();
        }
    }
}
