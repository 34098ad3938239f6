/*!
Metric schemas for validating generated telemetry

One schema per device type: the exact metric key set plus the allowed range
of every numeric metric. Used to check payloads captured by the mock broker.
*/

use anyhow::Result;
use chrono::DateTime;
use fleet_simulator::{DeviceDescriptor, DeviceType, MetricValue, TelemetryMessage};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub enum Expected {
    /// Inclusive range
    Range(f64, f64),
    /// Lower bound inclusive, upper bound exclusive
    HalfOpen(f64, f64),
    Text(&'static str),
}

#[derive(Debug, Clone)]
pub struct MetricSchema {
    pub name: &'static str,
    pub metrics: Vec<(&'static str, Expected)>,
}

impl MetricSchema {
    pub fn keys(&self) -> BTreeSet<&'static str> {
        self.metrics.iter().map(|(key, _)| *key).collect()
    }
}

/// Schemas of every known device type, plus the generic fallback
pub struct SchemaBook {
    schemas: HashMap<DeviceType, MetricSchema>,
    generic: MetricSchema,
}

impl SchemaBook {
    pub fn standard() -> Self {
        use Expected::*;

        let mut schemas = HashMap::new();
        schemas.insert(
            DeviceType::AirQuality,
            MetricSchema {
                name: "AIR_QUALITY",
                metrics: vec![
                    ("pm25", Range(10.0, 60.0)),
                    ("pm10", Range(20.0, 100.0)),
                    ("co2", Range(400.0, 600.0)),
                    ("humidity", Range(30.0, 70.0)),
                    ("temperature", Range(10.0, 25.0)),
                    ("aqi", Range(50.0, 150.0)),
                ],
            },
        );
        schemas.insert(
            DeviceType::EnergyMeter,
            MetricSchema {
                name: "ENERGY_METER",
                metrics: vec![
                    ("voltage", Range(220.0, 240.0)),
                    ("current", Range(5.0, 15.0)),
                    ("power", Range(1000.0, 3000.0)),
                    ("energy", Range(500.0, 600.0)),
                    ("frequency", Range(49.0, 51.0)),
                    ("powerFactor", Range(0.8, 1.0)),
                ],
            },
        );
        schemas.insert(
            DeviceType::SolarPanel,
            MetricSchema {
                name: "SOLAR_PANEL",
                metrics: vec![
                    ("power", Range(0.0, 5000.0)),
                    ("current", Range(0.0, 20.0)),
                    ("irradiance", Range(0.0, 1000.0)),
                    ("panelTemperature", Range(20.0, 45.0)),
                    ("efficiency", Range(15.0, 22.0)),
                ],
            },
        );
        schemas.insert(
            DeviceType::WeatherStation,
            MetricSchema {
                name: "WEATHER_STATION",
                metrics: vec![
                    ("temperature", Range(10.0, 25.0)),
                    ("humidity", Range(40.0, 80.0)),
                    ("pressure", Range(1000.0, 1050.0)),
                    ("windSpeed", Range(2.0, 22.0)),
                    ("windDirection", HalfOpen(0.0, 360.0)),
                    ("rainfall", Range(0.0, 5.0)),
                    ("uvIndex", Range(0.0, 10.0)),
                ],
            },
        );
        schemas.insert(
            DeviceType::WaterSensor,
            MetricSchema {
                name: "WATER_SENSOR",
                metrics: vec![
                    ("flowRate", Range(10.0, 60.0)),
                    ("ph", Range(6.5, 8.5)),
                    ("tds", Range(100.0, 300.0)),
                    ("turbidity", Range(0.0, 5.0)),
                    ("temperature", Range(15.0, 25.0)),
                    ("level", Range(50.0, 150.0)),
                ],
            },
        );

        let generic = MetricSchema {
            name: "GENERIC",
            metrics: vec![("value", Range(0.0, 100.0)), ("status", Text("active"))],
        };

        Self { schemas, generic }
    }

    /// Unknown device types map to the generic schema
    pub fn schema_for(&self, device_type: &DeviceType) -> &MetricSchema {
        self.schemas.get(device_type).unwrap_or(&self.generic)
    }

    /// Checks key set, value ranges and two-decimal rounding
    pub fn validate(&self, device_type: &DeviceType, message: &TelemetryMessage) -> Result<()> {
        let schema = self.schema_for(device_type);

        let actual: BTreeSet<&str> = message.metrics.keys().map(String::as_str).collect();
        let expected = schema.keys();
        if actual != expected {
            anyhow::bail!(
                "{} metric keys mismatch: expected {:?}, got {:?}",
                schema.name, expected, actual
            );
        }

        for (key, rule) in &schema.metrics {
            let value = &message.metrics[*key];
            match (rule, value) {
                (Expected::Text(text), MetricValue::Text(actual)) if actual.as_str() == *text => {}
                (Expected::Range(min, max), MetricValue::Number(v)) if *v >= *min && *v <= *max => {
                    check_rounding(key, *v)?;
                }
                (Expected::HalfOpen(min, max), MetricValue::Number(v)) if *v >= *min && *v < *max => {
                    check_rounding(key, *v)?;
                }
                _ => anyhow::bail!("{}.{} out of schema: {:?} (expected {:?})", schema.name, key, value, rule),
            }
        }

        Ok(())
    }

    /// Decodes a wire payload and validates it against its origin device
    pub fn validate_payload(&self, device: &DeviceDescriptor, payload: &[u8]) -> Result<TelemetryMessage> {
        let raw: serde_json::Value = serde_json::from_slice(payload)?;
        let stamp = raw
            .get("timestamp")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("payload without timestamp"))?;
        DateTime::parse_from_rfc3339(stamp)?;

        let message: TelemetryMessage = serde_json::from_value(raw)?;
        if message.device_id != device.id {
            anyhow::bail!("deviceId {} does not match origin {}", message.device_id, device.id);
        }

        self.validate(&device.device_type, &message)?;
        Ok(message)
    }
}

impl Default for SchemaBook {
    fn default() -> Self {
        Self::standard()
    }
}

fn check_rounding(key: &str, value: f64) -> Result<()> {
    let scaled = value * 100.0;
    if (scaled - scaled.round()).abs() > 1e-6 {
        anyhow::bail!("{} = {} has more than two decimals", key, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_simulator::{generate, Location};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn device(device_type: DeviceType) -> DeviceDescriptor {
        DeviceDescriptor::new(
            "schema-1",
            "Schema probe",
            device_type,
            Location {
                latitude: 0.0,
                longitude: 0.0,
                description: "probe".to_string(),
            },
            1000,
        )
    }

    #[test]
    fn test_generated_payload_passes_schema() {
        let book = SchemaBook::standard();
        let mut rng = StdRng::seed_from_u64(5);
        for kind in DeviceType::KNOWN {
            let dev = device(kind);
            let msg = generate(&dev, &chrono::Utc::now(), &mut rng);
            let bytes = serde_json::to_vec(&msg).unwrap();
            book.validate_payload(&dev, &bytes).unwrap();
        }
    }

    #[test]
    fn test_schema_rejects_out_of_range_and_extra_keys() {
        let book = SchemaBook::standard();
        let dev = device(DeviceType::WaterSensor);
        let mut msg = generate(&dev, &chrono::Utc::now(), &mut StdRng::seed_from_u64(1));

        msg.metrics.insert("ph".to_string(), MetricValue::Number(14.0));
        assert!(book.validate(&dev.device_type, &msg).is_err());

        let mut msg = generate(&dev, &chrono::Utc::now(), &mut StdRng::seed_from_u64(1));
        msg.metrics.insert("salinity".to_string(), MetricValue::Number(1.0));
        assert!(book.validate(&dev.device_type, &msg).is_err());
    }

    #[test]
    fn test_payload_from_other_device_is_rejected() {
        let book = SchemaBook::standard();
        let dev = device(DeviceType::AirQuality);
        let msg = generate(&dev, &chrono::Utc::now(), &mut StdRng::seed_from_u64(2));
        let bytes = serde_json::to_vec(&msg).unwrap();

        let mut other = dev.clone();
        other.id = "someone-else".to_string();
        assert!(book.validate_payload(&other, &bytes).is_err());
    }
}
