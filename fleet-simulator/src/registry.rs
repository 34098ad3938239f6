//! Device registry - static descriptors of every simulated device
//!
//! Descriptors are created once at configuration time and never mutated.
//! The registry either comes from the built-in default fleet or from a YAML
//! file of the form:
//!
//! ```yaml
//! devices:
//!   - id: aq-001
//!     name: Air Quality Monitor - Downtown
//!     deviceType: AIR_QUALITY
//!     location: { latitude: 40.7128, longitude: -74.006, description: Downtown }
//!     publishIntervalMs: 5000
//!     topic: iot/air-quality/aq-001
//! ```

use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Closed set of simulated device kinds
///
/// Types that are not recognised are kept as `Unknown` rather than rejected,
/// the generator answers them with a generic payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceType {
    AirQuality,
    EnergyMeter,
    SolarPanel,
    WeatherStation,
    WaterSensor,
    Unknown(String),
}

impl DeviceType {
    pub const KNOWN: [DeviceType; 5] = [
        DeviceType::AirQuality,
        DeviceType::EnergyMeter,
        DeviceType::SolarPanel,
        DeviceType::WeatherStation,
        DeviceType::WaterSensor,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            DeviceType::AirQuality => "AIR_QUALITY",
            DeviceType::EnergyMeter => "ENERGY_METER",
            DeviceType::SolarPanel => "SOLAR_PANEL",
            DeviceType::WeatherStation => "WEATHER_STATION",
            DeviceType::WaterSensor => "WATER_SENSOR",
            DeviceType::Unknown(raw) => raw,
        }
    }

    /// Topic segment used by the default fleet (`iot/<segment>/<id>`)
    fn topic_segment(&self) -> &str {
        match self {
            DeviceType::AirQuality => "air-quality",
            DeviceType::EnergyMeter => "energy",
            DeviceType::SolarPanel => "solar",
            DeviceType::WeatherStation => "weather",
            DeviceType::WaterSensor => "water",
            DeviceType::Unknown(_) => "generic",
        }
    }
}

impl From<String> for DeviceType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "AIR_QUALITY" => DeviceType::AirQuality,
            "ENERGY_METER" => DeviceType::EnergyMeter,
            "SOLAR_PANEL" => DeviceType::SolarPanel,
            "WEATHER_STATION" => DeviceType::WeatherStation,
            "WATER_SENSOR" => DeviceType::WaterSensor,
            _ => DeviceType::Unknown(raw),
        }
    }
}

impl From<DeviceType> for String {
    fn from(device_type: DeviceType) -> Self {
        device_type.as_str().to_string()
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
}

/// Static configuration record identifying one simulated device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub id: String,
    pub name: String,
    pub device_type: DeviceType,
    pub location: Location,
    pub publish_interval_ms: u64,
    pub topic: String,
}

impl DeviceDescriptor {
    /// Descriptor with the default `iot/<type>/<id>` topic
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        device_type: DeviceType,
        location: Location,
        publish_interval_ms: u64,
    ) -> Self {
        let id = id.into();
        let topic = format!("iot/{}/{}", device_type.topic_segment(), id);
        Self {
            id,
            name: name.into(),
            device_type,
            location,
            publish_interval_ms,
            topic,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct FleetFile {
    devices: Vec<DeviceDescriptor>,
}

/// Validated, immutable list of device descriptors
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    devices: Vec<DeviceDescriptor>,
}

impl DeviceRegistry {
    /// Builds a registry, rejecting duplicate ids and zero intervals
    pub fn new(devices: Vec<DeviceDescriptor>) -> Result<Self, RegistryError> {
        if devices.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = HashSet::new();
        for device in &devices {
            if device.publish_interval_ms == 0 {
                return Err(RegistryError::ZeroInterval(device.id.clone()));
            }
            if !seen.insert(device.id.as_str()) {
                return Err(RegistryError::DuplicateId(device.id.clone()));
            }
        }

        Ok(Self { devices })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, RegistryError> {
        let file: FleetFile = serde_yaml::from_str(yaml)?;
        Self::new(file.devices)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// One device of each kind, spread over a city
    pub fn default_fleet() -> Self {
        let devices = vec![
            DeviceDescriptor::new(
                "aq-001",
                "Air Quality Monitor - Downtown",
                DeviceType::AirQuality,
                Location {
                    latitude: 40.7128,
                    longitude: -74.0060,
                    description: "Downtown, city hall plaza".to_string(),
                },
                5_000,
            ),
            DeviceDescriptor::new(
                "em-001",
                "Energy Meter - Building A",
                DeviceType::EnergyMeter,
                Location {
                    latitude: 40.7580,
                    longitude: -73.9855,
                    description: "Building A, basement switchboard".to_string(),
                },
                10_000,
            ),
            DeviceDescriptor::new(
                "sp-001",
                "Solar Panel Array - Rooftop",
                DeviceType::SolarPanel,
                Location {
                    latitude: 40.7489,
                    longitude: -73.9680,
                    description: "Building B rooftop".to_string(),
                },
                15_000,
            ),
            DeviceDescriptor::new(
                "ws-001",
                "Weather Station - Park",
                DeviceType::WeatherStation,
                Location {
                    latitude: 40.7829,
                    longitude: -73.9654,
                    description: "Central park meadow".to_string(),
                },
                30_000,
            ),
            DeviceDescriptor::new(
                "wt-001",
                "Water Quality Sensor - Reservoir",
                DeviceType::WaterSensor,
                Location {
                    latitude: 40.7851,
                    longitude: -73.9626,
                    description: "Reservoir intake".to_string(),
                },
                20_000,
            ),
        ];

        Self { devices }
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    pub fn get(&self, id: &str) -> Option<&DeviceDescriptor> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
