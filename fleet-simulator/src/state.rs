use serde::{Deserialize, Serialize};

/// Lifecycle of a simulated fleet; `Stopped` is both initial and terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Snapshot returned by `SimulationController::status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStatus {
    pub running: bool,
    pub connected: bool,
    pub phase: Phase,
    pub device_count: usize,
    pub active_timers: usize,
    pub messages_published: u64,
    pub publish_failures: u64,
}
