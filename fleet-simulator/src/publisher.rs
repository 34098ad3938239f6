//! Publisher channel - one shared broker connection for the whole fleet
//!
//! Encodes telemetry as JSON and hands it to the transport without waiting on
//! the broker. Outcomes are counted so the controller can report them.

use crate::error::{ConnectionError, PublishError};
use crate::telemetry::TelemetryMessage;
use crate::transport::{QoS, Transport};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

pub struct PublisherChannel<T: Transport> {
    transport: T,
    published: AtomicU64,
    failures: AtomicU64,
}

impl<T: Transport> PublisherChannel<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            published: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn connect(&self) -> Result<(), ConnectionError> {
        self.transport.connect().await?;
        info!("Publisher channel connected");
        Ok(())
    }

    /// Safe to call when already disconnected
    pub async fn disconnect(&self) {
        if self.transport.is_connected() {
            info!("Publisher channel disconnecting");
        }
        self.transport.disconnect().await;
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Queues one message; never blocks and never panics
    ///
    /// The error is returned to the caller's failure handling; the channel
    /// stays usable afterwards.
    pub fn publish(&self, topic: &str, message: &TelemetryMessage, qos: QoS) -> Result<(), PublishError> {
        let result = self.encode_and_send(topic, message, qos);
        match &result {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                debug!(device_id = %message.device_id, topic = %topic, "Telemetry published");
            }
            Err(_) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    fn encode_and_send(&self, topic: &str, message: &TelemetryMessage, qos: QoS) -> Result<(), PublishError> {
        if !self.transport.is_connected() {
            return Err(PublishError::NotConnected);
        }
        let payload = serde_json::to_vec(message)?;
        self.transport.publish(topic, payload, qos)
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
