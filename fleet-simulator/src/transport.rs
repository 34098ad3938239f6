//! Broker transport - the connect/publish/disconnect contract
//!
//! `Transport` is the seam between the engine and the broker. `MqttTransport`
//! is the production implementation over `rumqttc`: one client per connect,
//! with the event loop driven by a background task that keeps reconnecting
//! after a drop until `disconnect()` is called.

use crate::error::{ConnectionError, PublishError};
use parking_lot::Mutex;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Incoming, MqttOptions, Outgoing};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use rumqttc::QoS;

const DEFAULT_MQTT_PORT: u16 = 1883;
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

/// Connection to a publish/subscribe broker
///
/// `publish` must not block: it either queues the message or fails at once.
pub trait Transport: Send + Sync + 'static {
    fn connect(&self) -> impl Future<Output = Result<(), ConnectionError>> + Send;

    fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), PublishError>;

    fn disconnect(&self) -> impl Future<Output = ()> + Send;

    fn is_connected(&self) -> bool;
}

/// `mqtt://host[:port]` or `tcp://host[:port]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
}

impl FromStr for BrokerEndpoint {
    type Err = ConnectionError;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        let invalid = || ConnectionError::InvalidEndpoint(url.to_string());

        let rest = match url.split_once("://") {
            Some(("mqtt" | "tcp", rest)) => rest,
            Some(_) => return Err(invalid()),
            None => url,
        };
        let rest = rest.trim_end_matches('/');

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
            None => (rest, DEFAULT_MQTT_PORT),
        };
        if host.is_empty() || host.contains('/') {
            return Err(invalid());
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for BrokerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mqtt://{}:{}", self.host, self.port)
    }
}

/// Settings for `MqttTransport`
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub endpoint: BrokerEndpoint,
    pub client_id_prefix: String,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    /// Capacity of the client request queue
    pub request_capacity: usize,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            endpoint: BrokerEndpoint {
                host: "localhost".to_string(),
                port: DEFAULT_MQTT_PORT,
            },
            client_id_prefix: "fleet-simulator".to_string(),
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(2),
            request_capacity: 100,
        }
    }
}

/// `rumqttc` backed transport
pub struct MqttTransport {
    settings: MqttSettings,
    client: Mutex<Option<AsyncClient>>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
    connected: Arc<AtomicBool>,
    /// Held for the whole of `open`/`close` so only one session exists
    session: tokio::sync::Mutex<()>,
}

impl MqttTransport {
    pub fn new(settings: MqttSettings) -> Self {
        Self {
            settings,
            client: Mutex::new(None),
            event_loop: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            session: tokio::sync::Mutex::new(()),
        }
    }

    async fn open(&self) -> Result<(), ConnectionError> {
        let _session = self.session.lock().await;

        if self.is_connected() {
            debug!("MQTT transport already connected");
            return Ok(());
        }
        // a previous session may still be reconnecting in the background
        self.close_session().await;

        let client_id = format!("{}-{}", self.settings.client_id_prefix, Uuid::new_v4().simple());
        let endpoint = &self.settings.endpoint;

        let mut mqtt_options = MqttOptions::new(&client_id, &endpoint.host, endpoint.port);
        mqtt_options.set_keep_alive(self.settings.keep_alive);
        mqtt_options.set_clean_session(true);

        let (client, mut eventloop) = AsyncClient::new(mqtt_options, self.settings.request_capacity);

        info!(client_id = %client_id, broker = %endpoint, "Connecting to MQTT broker");

        let handshake = async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                        return match ack.code {
                            ConnectReturnCode::Success => Ok(()),
                            code => Err(ConnectionError::Refused(format!("{:?}", code))),
                        };
                    }
                    Ok(_) => {}
                    Err(e) => return Err(ConnectionError::Transport(e.to_string())),
                }
            }
        };

        match tokio::time::timeout(self.settings.connect_timeout, handshake).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(broker = %endpoint, "MQTT connection failed: {}", e);
                return Err(e);
            }
            Err(_) => {
                error!(broker = %endpoint, "MQTT connection timed out");
                return Err(ConnectionError::Timeout(self.settings.connect_timeout));
            }
        }

        self.connected.store(true, Ordering::SeqCst);
        let handle = tokio::spawn(drive_event_loop(
            eventloop,
            self.connected.clone(),
            self.settings.reconnect_delay,
        ));

        *self.client.lock() = Some(client);
        *self.event_loop.lock() = Some(handle);

        info!(client_id = %client_id, "Connected to MQTT broker");
        Ok(())
    }

    async fn close(&self) {
        let _session = self.session.lock().await;
        self.close_session().await;
    }

    async fn close_session(&self) {
        let client = self.client.lock().take();
        let handle = self.event_loop.lock().take();

        if let Some(client) = client {
            if let Err(e) = client.try_disconnect() {
                debug!("MQTT disconnect request not queued: {}", e);
            }
        }

        if let Some(mut handle) = handle {
            if tokio::time::timeout(DISCONNECT_GRACE, &mut handle).await.is_err() {
                warn!("MQTT event loop did not stop in time, aborting it");
                handle.abort();
            }
        }

        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.event_loop.get_mut().take() {
            handle.abort();
        }
    }
}

impl Transport for MqttTransport {
    fn connect(&self) -> impl Future<Output = Result<(), ConnectionError>> + Send {
        self.open()
    }

    fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::NotConnected);
        }

        let guard = self.client.lock();
        let client = guard.as_ref().ok_or(PublishError::NotConnected)?;
        client
            .try_publish(topic, qos, false, payload)
            .map_err(|e| PublishError::Rejected(e.to_string()))
    }

    fn disconnect(&self) -> impl Future<Output = ()> + Send {
        self.close()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Polls the event loop until the client sends DISCONNECT
///
/// A poll error means the connection dropped; rumqttc reconnects on the next
/// poll, so we only wait `reconnect_delay` and keep going.
async fn drive_event_loop(mut eventloop: EventLoop, connected: Arc<AtomicBool>, reconnect_delay: Duration) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                if !connected.swap(true, Ordering::SeqCst) {
                    info!("Reconnected to MQTT broker");
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                connected.store(false, Ordering::SeqCst);
                debug!("MQTT event loop finished after disconnect");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                if connected.swap(false, Ordering::SeqCst) {
                    error!("MQTT connection lost: {}", e);
                } else {
                    debug!("MQTT reconnect attempt failed: {}", e);
                }
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
}
