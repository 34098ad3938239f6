/*!
# Fleet DevKit - test doubles for the fleet simulator

Helpers for exercising the simulator without a real broker:
- `MockBroker`, an in-memory `Transport` with failure injection
- Metric schemas to validate generated payloads
- `TestHarness` wiring a controller to the mock broker
*/

pub mod mqtt_stub;
pub mod schema_helpers;
pub mod test_utils;

pub use mqtt_stub::{ConnectBehavior, MockBroker, MockMessage};
pub use schema_helpers::{MetricSchema, SchemaBook};
pub use test_utils::{device, fleet, TestHarness, TestStats};
