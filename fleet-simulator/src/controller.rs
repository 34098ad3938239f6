//! Simulation controller - lifecycle of one simulated fleet
//!
//! Owns the registry, the publisher channel and the per-device scheduler.
//! State machine: Stopped -> Starting -> Running -> Stopping -> Stopped.
//! `start`, `stop` and `disconnect` are serialized through one async lock so
//! a stopping fleet and a restarting one never interleave.

use crate::error::{ConnectionError, SimulationError};
use crate::publisher::PublisherChannel;
use crate::registry::{DeviceDescriptor, DeviceRegistry};
use crate::scheduler::{device_rng, DeviceScheduler};
use crate::state::{Phase, SimulationStatus};
use crate::transport::{QoS, Transport};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub qos: QoS,
    /// Base seed for reproducible telemetry; entropy when `None`
    pub seed: Option<u64>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            qos: QoS::AtLeastOnce,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { devices: usize },
    AlreadyRunning,
}

pub struct SimulationController<T: Transport> {
    registry: DeviceRegistry,
    channel: Arc<PublisherChannel<T>>,
    scheduler: DeviceScheduler,
    phase: Mutex<Phase>,
    lifecycle: tokio::sync::Mutex<()>,
    options: ControllerOptions,
}

impl<T: Transport> SimulationController<T> {
    pub fn new(registry: DeviceRegistry, transport: T, options: ControllerOptions) -> Self {
        Self {
            registry,
            channel: Arc::new(PublisherChannel::new(transport)),
            scheduler: DeviceScheduler::new(),
            phase: Mutex::new(Phase::Stopped),
            lifecycle: tokio::sync::Mutex::new(()),
            options,
        }
    }

    /// Connects the publisher channel; failures are returned, never retried here
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        self.channel.connect().await
    }

    /// Starts every device: one immediate publish, then one per interval
    pub async fn start(&self) -> Result<StartOutcome, SimulationError> {
        let _lifecycle = self.lifecycle.lock().await;

        if self.phase() == Phase::Running {
            warn!("Simulation already running, start ignored");
            return Ok(StartOutcome::AlreadyRunning);
        }
        if !self.channel.is_connected() {
            warn!("Cannot start simulation: publisher channel not connected");
            return Err(SimulationError::NotConnected);
        }

        self.set_phase(Phase::Starting);
        for (index, device) in self.registry.devices().iter().enumerate() {
            self.scheduler.schedule(
                device.clone(),
                self.channel.clone(),
                self.options.qos,
                device_rng(self.options.seed, index),
            );
            info!(
                device_id = %device.id,
                topic = %device.topic,
                interval_ms = device.publish_interval_ms,
                "Device started"
            );
        }
        self.set_phase(Phase::Running);

        let devices = self.registry.len();
        info!(devices, "Simulation started");
        Ok(StartOutcome::Started { devices })
    }

    /// Cancels every device timer; no publish happens once this returns
    pub async fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.stop_locked().await;
    }

    /// Stops if needed, then releases the broker connection
    pub async fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.stop_locked().await;
        self.channel.disconnect().await;
        info!("Simulation disconnected");
    }

    async fn stop_locked(&self) {
        if self.phase() == Phase::Stopped {
            debug!("Simulation already stopped");
            return;
        }

        self.set_phase(Phase::Stopping);
        self.scheduler.cancel_all().await;
        self.set_phase(Phase::Stopped);
        info!("Simulation stopped");
    }

    pub fn status(&self) -> SimulationStatus {
        let phase = self.phase();
        SimulationStatus {
            running: phase == Phase::Running,
            connected: self.channel.is_connected(),
            phase,
            device_count: self.registry.len(),
            active_timers: self.scheduler.active(),
            messages_published: self.channel.published(),
            publish_failures: self.channel.failures(),
        }
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        self.registry.devices()
    }

    pub fn channel(&self) -> &Arc<PublisherChannel<T>> {
        &self.channel
    }

    fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    fn set_phase(&self, phase: Phase) {
        *self.phase.lock() = phase;
    }
}
