//! Fleet Simulator - synthetic IoT telemetry over MQTT
//!
//! Models a fleet of heterogeneous devices (air quality, energy, solar,
//! weather, water). Each device generates plausible readings on its own
//! schedule and publishes them as JSON to its own topic:
//! - Device registry (static descriptors, YAML or built-in)
//! - Telemetry generator (per-type synthesis, diurnal solar curve)
//! - Publisher channel over a single broker connection
//! - Per-device scheduler and fleet controller

pub mod config;
pub mod controller;
pub mod error;
pub mod publisher;
pub mod registry;
pub mod scheduler;
pub mod state;
pub mod telemetry;
pub mod transport;

pub use config::SimulatorConfig;
pub use controller::{ControllerOptions, SimulationController, StartOutcome};
pub use error::{ConfigError, ConnectionError, PublishError, RegistryError, SimulationError};
pub use registry::{DeviceDescriptor, DeviceRegistry, DeviceType, Location};
pub use state::{Phase, SimulationStatus};
pub use telemetry::{generate, MetricValue, TelemetryMessage};
pub use transport::{BrokerEndpoint, MqttSettings, MqttTransport, QoS, Transport};

/// Controller wired to the real MQTT transport from a loaded config
pub fn mqtt_controller(config: &SimulatorConfig) -> Result<SimulationController<MqttTransport>, ConfigError> {
    let registry = config.load_registry()?;
    let transport = MqttTransport::new(config.mqtt.clone());
    Ok(SimulationController::new(registry, transport, config.controller_options()))
}
