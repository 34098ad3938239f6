/*!
Mock broker transport for developing and testing without a real MQTT broker

Records every published message and lets tests inject failures:
- refuse or never acknowledge `connect()`
- reject publishes on selected topics
- drop the connection as if the network went away
*/

use fleet_simulator::{ConnectionError, PublishError, QoS, Transport};
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use anyhow::Result;

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
}

/// How the mock answers `connect()`
#[derive(Debug, Clone)]
pub enum ConnectBehavior {
    Accept,
    Refuse(String),
    /// Never acknowledges; `connect()` fails with a timeout after the delay
    NeverAck(Duration),
}

struct Inner {
    published: Mutex<Vec<MockMessage>>,
    failing_topics: Mutex<HashSet<String>>,
    connect_behavior: Mutex<ConnectBehavior>,
    connected: AtomicBool,
    connect_attempts: AtomicUsize,
    rejected: AtomicUsize,
    message_sender: Mutex<Option<mpsc::UnboundedSender<MockMessage>>>,
}

/// In-memory `Transport`; clones share the same state
#[derive(Clone)]
pub struct MockBroker {
    inner: Arc<Inner>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                published: Mutex::new(Vec::new()),
                failing_topics: Mutex::new(HashSet::new()),
                connect_behavior: Mutex::new(ConnectBehavior::Accept),
                connected: AtomicBool::new(false),
                connect_attempts: AtomicUsize::new(0),
                rejected: AtomicUsize::new(0),
                message_sender: Mutex::new(None),
            }),
        }
    }

    pub fn with_connect_behavior(self, behavior: ConnectBehavior) -> Self {
        *self.inner.connect_behavior.lock().unwrap() = behavior;
        self
    }

    /// Channel receiving every accepted message as it is published
    pub fn setup_receiver(&self) -> mpsc::UnboundedReceiver<MockMessage> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.inner.message_sender.lock().unwrap() = Some(sender);
        receiver
    }

    /// Rejects every publish on `topic` until `heal_topic`
    pub fn fail_topic(&self, topic: &str) {
        self.inner.failing_topics.lock().unwrap().insert(topic.to_string());
        log::info!("💥 [MOCK] Failing publishes on {}", topic);
    }

    pub fn heal_topic(&self, topic: &str) {
        self.inner.failing_topics.lock().unwrap().remove(topic);
        log::info!("🩹 [MOCK] Publishes on {} accepted again", topic);
    }

    /// Simulates an unexpected connection loss
    pub fn drop_connection(&self) {
        self.inner.connected.store(false, Ordering::SeqCst);
        log::info!("🔌 [MOCK] Connection dropped");
    }

    pub fn restore_connection(&self) {
        self.inner.connected.store(true, Ordering::SeqCst);
        log::info!("🔌 [MOCK] Connection restored");
    }

    pub fn connect_attempts(&self) -> usize {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    /// Publishes refused by injected failures
    pub fn rejected_count(&self) -> usize {
        self.inner.rejected.load(Ordering::SeqCst)
    }

    /// Every accepted message, in publish order
    pub fn get_published_messages(&self) -> Vec<MockMessage> {
        self.inner.published.lock().unwrap().clone()
    }

    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        self.inner
            .published
            .lock()
            .unwrap()
            .iter()
            .filter(|msg| msg.topic == topic)
            .cloned()
            .collect()
    }

    pub fn count_for_topic(&self, topic: &str) -> usize {
        self.inner
            .published
            .lock()
            .unwrap()
            .iter()
            .filter(|msg| msg.topic == topic)
            .count()
    }

    /// Parses the last message of a topic as JSON
    pub fn get_last_json_message<T>(&self, topic: &str) -> Result<Option<T>>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let messages = self.find_messages_by_topic(topic);
        if let Some(last_msg) = messages.last() {
            let parsed: T = serde_json::from_slice(&last_msg.payload)?;
            Ok(Some(parsed))
        } else {
            Ok(None)
        }
    }

    pub fn clear(&self) {
        self.inner.published.lock().unwrap().clear();
        self.inner.failing_topics.lock().unwrap().clear();
        self.inner.rejected.store(0, Ordering::SeqCst);
    }
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockBroker {
    fn connect(&self) -> impl Future<Output = Result<(), ConnectionError>> + Send {
        async move {
            self.inner.connect_attempts.fetch_add(1, Ordering::SeqCst);
            let behavior = self.inner.connect_behavior.lock().unwrap().clone();
            match behavior {
                ConnectBehavior::Accept => {
                    self.inner.connected.store(true, Ordering::SeqCst);
                    log::info!("✅ [MOCK] Connected");
                    Ok(())
                }
                ConnectBehavior::Refuse(reason) => Err(ConnectionError::Refused(reason)),
                ConnectBehavior::NeverAck(timeout) => {
                    tokio::time::sleep(timeout).await;
                    Err(ConnectionError::Timeout(timeout))
                }
            }
        }
    }

    fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::NotConnected);
        }
        if self.inner.failing_topics.lock().unwrap().contains(topic) {
            self.inner.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(PublishError::Rejected(format!("injected failure on {}", topic)));
        }

        let message = MockMessage {
            topic: topic.to_string(),
            payload,
            qos,
        };
        log::debug!("📤 [MOCK] Published to {}: {} bytes", message.topic, message.payload.len());

        if let Some(sender) = self.inner.message_sender.lock().unwrap().as_ref() {
            let _ = sender.send(message.clone());
        }
        self.inner.published.lock().unwrap().push(message);
        Ok(())
    }

    fn disconnect(&self) -> impl Future<Output = ()> + Send {
        async move {
            if self.inner.connected.swap(false, Ordering::SeqCst) {
                log::info!("👋 [MOCK] Disconnected");
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }
}
