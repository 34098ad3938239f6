//! Process configuration from environment (and `.env`) plus an optional
//! YAML fleet file.

use crate::controller::ControllerOptions;
use crate::error::ConfigError;
use crate::registry::DeviceRegistry;
use crate::transport::{BrokerEndpoint, MqttSettings, QoS};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub mqtt: MqttSettings,
    pub qos: QoS,
    pub seed: Option<u64>,
    pub fleet_file: Option<PathBuf>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttSettings::default(),
            qos: QoS::AtLeastOnce,
            seed: None,
            fleet_file: None,
        }
    }
}

impl SimulatorConfig {
    /// Reads the process environment (after loading `.env` if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys keep their default
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("BROKER_URL") {
            config.mqtt.endpoint = BrokerEndpoint::from_str(&url)?;
        }
        if let Some(prefix) = lookup("MQTT_CLIENT_PREFIX") {
            config.mqtt.client_id_prefix = prefix;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "MQTT_KEEP_ALIVE_SECS")? {
            config.mqtt.keep_alive = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "MQTT_CONNECT_TIMEOUT_MS")? {
            if ms == 0 {
                return Err(invalid("MQTT_CONNECT_TIMEOUT_MS", ms));
            }
            config.mqtt.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "MQTT_RECONNECT_DELAY_MS")? {
            config.mqtt.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(level) = parse_var::<u8, _>(&lookup, "MQTT_QOS")? {
            config.qos = match level {
                0 => QoS::AtMostOnce,
                1 => QoS::AtLeastOnce,
                2 => QoS::ExactlyOnce,
                other => return Err(invalid("MQTT_QOS", other)),
            };
        }
        config.seed = parse_var::<u64, _>(&lookup, "SIMULATOR_SEED")?;
        config.fleet_file = lookup("FLEET_CONFIG").map(PathBuf::from);

        Ok(config)
    }

    /// Fleet from `FLEET_CONFIG` when set, built-in default fleet otherwise
    pub fn load_registry(&self) -> Result<DeviceRegistry, ConfigError> {
        match &self.fleet_file {
            Some(path) => Ok(DeviceRegistry::load(path)?),
            None => Ok(DeviceRegistry::default_fleet()),
        }
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            qos: self.qos,
            seed: self.seed,
        }
    }
}

fn parse_var<V, F>(lookup: &F, key: &'static str) -> Result<Option<V>, ConfigError>
where
    V: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<V>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

fn invalid(key: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    }
}
