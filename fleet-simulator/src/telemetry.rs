//! Telemetry generation for simulated devices
//!
//! `generate` maps a descriptor and an instant to a fresh `TelemetryMessage`.
//! Values are random but the metric key set and value ranges are fixed per
//! device type. Randomness is injected so callers can seed it; the number of
//! draws per device type does not depend on the instant.

use crate::registry::{DeviceDescriptor, DeviceType};
use chrono::{DateTime, TimeZone, Timelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Single metric reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            MetricValue::Text(_) => None,
        }
    }
}

pub type Metrics = BTreeMap<String, MetricValue>;

/// Message published for one tick of one device (wire format is JSON)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryMessage {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub metrics: Metrics,
}

impl TelemetryMessage {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).and_then(MetricValue::as_f64)
    }
}

// Solar array nameplate ratings at full irradiance
const SOLAR_PEAK_POWER_W: f64 = 5000.0;
const SOLAR_PEAK_CURRENT_A: f64 = 20.0;
const SOLAR_PEAK_IRRADIANCE_WM2: f64 = 1000.0;

/// Builds the telemetry message of `descriptor` at instant `now`
///
/// Never fails: unrecognised device types get the generic payload.
pub fn generate<Tz, R>(descriptor: &DeviceDescriptor, now: &DateTime<Tz>, rng: &mut R) -> TelemetryMessage
where
    Tz: TimeZone,
    R: Rng,
{
    let mut metrics = Metrics::new();

    match &descriptor.device_type {
        DeviceType::AirQuality => {
            put(&mut metrics, "pm25", rng.gen_range(10.0..=60.0));
            put(&mut metrics, "pm10", rng.gen_range(20.0..=100.0));
            put(&mut metrics, "co2", rng.gen_range(400.0..=600.0));
            put(&mut metrics, "humidity", rng.gen_range(30.0..=70.0));
            put(&mut metrics, "temperature", rng.gen_range(10.0..=25.0));
            put(&mut metrics, "aqi", rng.gen_range(50.0..=150.0));
        }
        DeviceType::EnergyMeter => {
            put(&mut metrics, "voltage", rng.gen_range(220.0..=240.0));
            put(&mut metrics, "current", rng.gen_range(5.0..=15.0));
            put(&mut metrics, "power", rng.gen_range(1000.0..=3000.0));
            put(&mut metrics, "energy", rng.gen_range(500.0..=600.0));
            put(&mut metrics, "frequency", rng.gen_range(49.0..=51.0));
            put(&mut metrics, "powerFactor", rng.gen_range(0.8..=1.0));
        }
        DeviceType::SolarPanel => {
            let curve = daylight_factor(fractional_hour(now));
            put(&mut metrics, "power", SOLAR_PEAK_POWER_W * curve * noise(rng));
            put(&mut metrics, "current", SOLAR_PEAK_CURRENT_A * curve * noise(rng));
            put(&mut metrics, "irradiance", SOLAR_PEAK_IRRADIANCE_WM2 * curve * noise(rng));
            put(&mut metrics, "panelTemperature", rng.gen_range(20.0..=45.0));
            put(&mut metrics, "efficiency", rng.gen_range(15.0..=22.0));
        }
        DeviceType::WeatherStation => {
            put(&mut metrics, "temperature", rng.gen_range(10.0..=25.0));
            put(&mut metrics, "humidity", rng.gen_range(40.0..=80.0));
            put(&mut metrics, "pressure", rng.gen_range(1000.0..=1050.0));
            put(&mut metrics, "windSpeed", rng.gen_range(2.0..=22.0));
            // 359.996 would round up to a full turn
            let direction = round2(rng.gen_range(0.0..360.0)) % 360.0;
            metrics.insert("windDirection".to_string(), MetricValue::Number(direction));
            put(&mut metrics, "rainfall", rng.gen_range(0.0..=5.0));
            put(&mut metrics, "uvIndex", rng.gen_range(0.0..=10.0));
        }
        DeviceType::WaterSensor => {
            put(&mut metrics, "flowRate", rng.gen_range(10.0..=60.0));
            put(&mut metrics, "ph", rng.gen_range(6.5..=8.5));
            put(&mut metrics, "tds", rng.gen_range(100.0..=300.0));
            put(&mut metrics, "turbidity", rng.gen_range(0.0..=5.0));
            put(&mut metrics, "temperature", rng.gen_range(15.0..=25.0));
            put(&mut metrics, "level", rng.gen_range(50.0..=150.0));
        }
        DeviceType::Unknown(_) => {
            put(&mut metrics, "value", rng.gen_range(0.0..=100.0));
            metrics.insert("status".to_string(), MetricValue::Text("active".to_string()));
        }
    }

    TelemetryMessage {
        device_id: descriptor.id.clone(),
        timestamp: now.with_timezone(&Utc),
        metrics,
    }
}

/// Half-sine daylight curve: 0 outside [6h, 18h), 1.0 at 12h.
///
/// Hard cutoff at dawn and dusk, no twilight smoothing.
pub fn daylight_factor(hour: f64) -> f64 {
    if (6.0..18.0).contains(&hour) {
        (PI * (hour - 6.0) / 12.0).sin().max(0.0)
    } else {
        0.0
    }
}

fn fractional_hour<Tz: TimeZone>(now: &DateTime<Tz>) -> f64 {
    now.hour() as f64 + now.minute() as f64 / 60.0 + now.second() as f64 / 3600.0
}

fn noise<R: Rng>(rng: &mut R) -> f64 {
    rng.gen_range(0.8..=1.0)
}

fn put(metrics: &mut Metrics, name: &str, value: f64) {
    metrics.insert(name.to_string(), MetricValue::Number(round2(value)));
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
