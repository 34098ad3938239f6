//! Error taxonomy for the simulation engine
//!
//! Connection-level errors surface synchronously from `connect()`/`start()`.
//! Publish errors are local to one tick of one device and are absorbed by the
//! scheduler after being logged.

use std::time::Duration;

/// Failure to establish the broker connection
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("invalid broker endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("broker did not acknowledge connection within {0:?}")]
    Timeout(Duration),
    #[error("broker refused connection: {0}")]
    Refused(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Failure to hand a single message to the broker
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("not connected to broker")]
    NotConnected,
    #[error("failed to encode telemetry: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// Invalid device registry contents
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("device registry is empty")]
    Empty,
    #[error("duplicate device id: {0}")]
    DuplicateId(String),
    #[error("device {0} has a zero publish interval")]
    ZeroInterval(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Invalid process configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error(transparent)]
    Endpoint(#[from] ConnectionError),
    #[error("fleet file error: {0}")]
    Registry(#[from] RegistryError),
}

/// Errors surfaced by the simulation controller
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("not connected to broker")]
    NotConnected,
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
