/*!
Test harness for the fleet simulator

Wires a `SimulationController` to a `MockBroker` and offers:
- device and fleet fixtures
- per-topic publish expectations
- payload validation against the metric schemas
*/

use crate::mqtt_stub::MockBroker;
use crate::schema_helpers::SchemaBook;
use anyhow::Result;
use fleet_simulator::{
    ControllerOptions, DeviceDescriptor, DeviceRegistry, DeviceType, Location, SimulationController,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Descriptor with a fixed lab location and the default topic
pub fn device(id: &str, device_type: DeviceType, publish_interval_ms: u64) -> DeviceDescriptor {
    DeviceDescriptor::new(
        id,
        format!("Test {}", id),
        device_type,
        Location {
            latitude: 45.5017,
            longitude: -73.5673,
            description: "test bench".to_string(),
        },
        publish_interval_ms,
    )
}

/// One device per interval, cycling through the known device types
pub fn fleet(intervals_ms: &[u64]) -> DeviceRegistry {
    let devices = intervals_ms
        .iter()
        .enumerate()
        .map(|(i, interval)| {
            let kind = DeviceType::KNOWN[i % DeviceType::KNOWN.len()].clone();
            device(&format!("dev-{}", i + 1), kind, *interval)
        })
        .collect();
    DeviceRegistry::new(devices).expect("fixture fleet is valid")
}

/// Complete harness: mock broker + controller + schemas
pub struct TestHarness {
    pub broker: MockBroker,
    pub controller: Arc<SimulationController<MockBroker>>,
    pub schemas: SchemaBook,
    expectations: Vec<Expectation>,
}

#[derive(Debug)]
struct Expectation {
    topic: String,
    at_least: usize,
}

impl TestHarness {
    pub fn new(registry: DeviceRegistry) -> Self {
        Self::with_broker(registry, MockBroker::new())
    }

    pub fn with_broker(registry: DeviceRegistry, broker: MockBroker) -> Self {
        env_logger::try_init().ok();

        let options = ControllerOptions {
            seed: Some(0x5eed),
            ..ControllerOptions::default()
        };
        let controller = Arc::new(SimulationController::new(registry, broker.clone(), options));

        Self {
            broker,
            controller,
            schemas: SchemaBook::standard(),
            expectations: Vec::new(),
        }
    }

    /// Connects and starts the fleet, failing the test on error
    pub async fn start(&self) -> Result<()> {
        self.controller.connect().await?;
        self.controller.start().await?;
        Ok(())
    }

    pub fn device(&self, id: &str) -> Result<DeviceDescriptor> {
        self.controller
            .devices()
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no device {}", id))
    }

    pub fn published_by(&self, device_id: &str) -> Result<usize> {
        let device = self.device(device_id)?;
        Ok(self.broker.count_for_topic(&device.topic))
    }

    /// Expects at least `count` messages on `topic`
    pub fn expect_messages(&mut self, topic: &str, count: usize) -> &mut Self {
        self.expectations.push(Expectation {
            topic: topic.to_string(),
            at_least: count,
        });
        self
    }

    pub fn verify_expectations(&self) -> Result<()> {
        log::info!("🔍 Verifying {} expectations...", self.expectations.len());

        for expectation in &self.expectations {
            let actual_count = self.broker.count_for_topic(&expectation.topic);
            if actual_count < expectation.at_least {
                anyhow::bail!(
                    "Expectation failed for topic '{}': expected at least {} messages, got {}",
                    expectation.topic,
                    expectation.at_least,
                    actual_count
                );
            }
            log::info!("✅ Topic '{}': {} messages", expectation.topic, actual_count);
        }

        Ok(())
    }

    /// Every captured payload must decode, match its origin device and fit its schema
    pub fn assert_all_payloads_valid(&self) -> Result<usize> {
        let by_topic: HashMap<&str, &DeviceDescriptor> = self
            .controller
            .devices()
            .iter()
            .map(|d| (d.topic.as_str(), d))
            .collect();

        let messages = self.broker.get_published_messages();
        for msg in &messages {
            let origin = by_topic
                .get(msg.topic.as_str())
                .ok_or_else(|| anyhow::anyhow!("message on unexpected topic {}", msg.topic))?;
            self.schemas.validate_payload(origin, &msg.payload)?;
        }

        Ok(messages.len())
    }

    pub fn get_stats(&self) -> TestStats {
        let mut topic_counts = HashMap::new();
        for msg in self.broker.get_published_messages() {
            *topic_counts.entry(msg.topic).or_insert(0) += 1;
        }

        TestStats {
            total_messages: topic_counts.values().sum(),
            topic_counts,
            rejected: self.broker.rejected_count(),
        }
    }

    pub fn reset(&mut self) {
        self.broker.clear();
        self.expectations.clear();
        log::info!("🧹 Test harness reset");
    }
}

#[derive(Debug)]
pub struct TestStats {
    pub total_messages: usize,
    pub topic_counts: HashMap<String, usize>,
    pub rejected: usize,
}

impl TestStats {
    pub fn print(&self) {
        println!("📊 Test Statistics:");
        println!("  Total messages: {}", self.total_messages);
        println!("  Rejected publishes: {}", self.rejected);
        for (topic, count) in &self.topic_counts {
            println!("    {}: {} messages", topic, count);
        }
    }
}
