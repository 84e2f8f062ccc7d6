//! `rumqttc` transport and the broker-connected service.
//!
//! **Subscribe Topics:**
//! - `iot/control/#` - Plain-text commands `VERB[:PARAM]`
//!
//! **Publish Topics:**
//! - `iot/status/<id>` - Status snapshot JSON
//! - `iot/<type>/<id>` - Telemetry JSON
//! - `iot/alert/<id>` - Plain-text alert (QoS 1)
//! - `iot/ack/<id>` - `ACK: ...` / `NACK: ...`
//!
//! The `rumqttc` event loop runs in its own task. It only tracks the
//! connection and forwards inbound publishes over a channel; everything else
//! happens on the simulation loop.
//!
//! ```ignore
//! let config = Config::load()?;
//! let service = MqttService::from_config(&config)?;
//! service.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rumqttc::{AsyncClient, ClientError, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::config::{Config, MqttConfig};
use crate::error::SimError;
use crate::scheduler::PublishScheduler;
use crate::simulator::Simulator;
use crate::traits::{Clock, MqttClient, MqttMessage, Qos, RandomSource, StdRandom, SystemClock};

use super::event_loop::{run_event_loop, LoopStats};

/// Pause before polling again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

// ============================================================================
// Configuration
// ============================================================================

/// Runtime MQTT client configuration for `rumqttc`.
#[derive(Debug, Clone, PartialEq)]
pub struct MqttRuntimeConfig {
    /// MQTT broker hostname
    pub host: String,
    /// MQTT broker port
    pub port: u16,
    /// Client ID
    pub client_id: String,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u16,
    /// Username and password, if the broker needs them
    pub credentials: Option<(String, String)>,
    /// Capacity of the outgoing request queue
    pub queue_capacity: usize,
}

impl Default for MqttRuntimeConfig {
    fn default() -> Self {
        Self::from_config(&MqttConfig::default())
    }
}

impl MqttRuntimeConfig {
    /// Create a new config with the given broker address
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Create from the file/env configuration
    pub fn from_config(config: &MqttConfig) -> Self {
        let credentials = match (&config.username, &config.password) {
            (Some(user), password) if config.has_auth() => {
                Some((user.clone(), password.clone().unwrap_or_default()))
            }
            _ => None,
        };
        Self {
            host: config.host.clone(),
            port: config.port,
            client_id: config.client_id.clone(),
            keep_alive_secs: config.keep_alive_secs,
            credentials,
            queue_capacity: config.queue_capacity.max(1),
        }
    }

    /// Set the client ID
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = id.into();
        self
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive_secs as u64));
        if let Some((user, password)) = &self.credentials {
            options.set_credentials(user, password);
        }
        options
    }
}

fn to_qos(qos: Qos) -> QoS {
    match qos {
        Qos::AtMostOnce => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
    }
}

// ============================================================================
// Client
// ============================================================================

/// [`MqttClient`] over a `rumqttc` [`AsyncClient`].
///
/// Publishes and subscribes are queued with `try_*` and never block the
/// simulation loop. Inbound messages arrive from [`EventLoopDriver`].
pub struct RumqttcClient {
    client: AsyncClient,
    inbox: mpsc::UnboundedReceiver<MqttMessage>,
    signal: Arc<Notify>,
    connected: Arc<AtomicBool>,
    subscriptions: Arc<Mutex<Vec<String>>>,
}

impl RumqttcClient {
    /// Create a client and the driver for its event loop.
    ///
    /// Nothing touches the network until the driver is spawned.
    pub fn new(config: &MqttRuntimeConfig) -> (Self, EventLoopDriver) {
        let (client, eventloop) = AsyncClient::new(config.options(), config.queue_capacity);
        let (tx, inbox) = mpsc::unbounded_channel();
        let signal = Arc::new(Notify::new());
        let connected = Arc::new(AtomicBool::new(false));
        let subscriptions = Arc::new(Mutex::new(Vec::new()));

        let driver = EventLoopDriver {
            eventloop,
            client: client.clone(),
            tx,
            signal: Arc::clone(&signal),
            connected: Arc::clone(&connected),
            subscriptions: Arc::clone(&subscriptions),
        };
        let client = Self {
            client,
            inbox,
            signal,
            connected,
            subscriptions,
        };
        (client, driver)
    }

    /// Notified whenever an inbound message was queued.
    pub fn notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.signal)
    }

    /// Queue a clean disconnect.
    pub fn disconnect(&self) -> Result<(), ClientError> {
        self.client.try_disconnect()
    }
}

impl MqttClient for RumqttcClient {
    type Error = ClientError;

    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos) -> Result<(), Self::Error> {
        self.client.try_publish(topic, to_qos(qos), false, payload.to_vec())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.client.try_subscribe(topic, QoS::AtLeastOnce)?;
        if let Ok(mut subscriptions) = self.subscriptions.lock() {
            subscriptions.push(topic.to_string());
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        self.inbox.try_recv().ok()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Event Loop Driver
// ============================================================================

/// Owns the `rumqttc` event loop: tracks the connection, re-subscribes after
/// a fresh session and forwards inbound publishes.
pub struct EventLoopDriver {
    eventloop: EventLoop,
    client: AsyncClient,
    tx: mpsc::UnboundedSender<MqttMessage>,
    signal: Arc<Notify>,
    connected: Arc<AtomicBool>,
    subscriptions: Arc<Mutex<Vec<String>>>,
}

impl EventLoopDriver {
    /// Run on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Poll until the receiving client is dropped.
    pub async fn run(mut self) {
        let mut sessions = 0u32;
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    self.connected.store(true, Ordering::Relaxed);
                    sessions += 1;
                    tracing::info!(session_present = ack.session_present, "connected to broker");
                    if sessions > 1 && !ack.session_present {
                        self.resubscribe();
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = MqttMessage::new(publish.topic, publish.payload.to_vec());
                    if self.tx.send(message).is_err() {
                        tracing::debug!("client dropped, stopping event loop");
                        break;
                    }
                    self.signal.notify_one();
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    self.connected.store(false, Ordering::Relaxed);
                    tracing::warn!("broker closed the connection");
                }
                Ok(_) => {}
                Err(e) => {
                    self.connected.store(false, Ordering::Relaxed);
                    tracing::error!(error = %e, "MQTT connection error");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    fn resubscribe(&self) {
        let Ok(subscriptions) = self.subscriptions.lock() else {
            return;
        };
        for topic in subscriptions.iter() {
            match self.client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                Ok(()) => tracing::info!(topic = %topic, "re-subscribed"),
                Err(e) => tracing::warn!(topic = %topic, error = %e, "re-subscribe failed"),
            }
        }
    }
}

// ============================================================================
// Service
// ============================================================================

/// A simulator connected to a real broker.
pub struct MqttService<R, K> {
    simulator: Simulator<RumqttcClient, R, K>,
    driver: EventLoopDriver,
}

impl MqttService<StdRandom, SystemClock> {
    /// Build the fleet and client described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, SimError> {
        let (client, driver) = RumqttcClient::new(&MqttRuntimeConfig::from_config(&config.mqtt));
        let simulator = config.build_simulator(client)?;
        Ok(Self { simulator, driver })
    }
}

impl<R: RandomSource, K: Clock> MqttService<R, K> {
    /// Wrap an already-built simulator and its driver.
    pub fn new(simulator: Simulator<RumqttcClient, R, K>, driver: EventLoopDriver) -> Self {
        Self { simulator, driver }
    }

    /// The simulator.
    pub fn simulator(&self) -> &Simulator<RumqttcClient, R, K> {
        &self.simulator
    }

    /// Connect, subscribe to the control topics and simulate until
    /// `shutdown` completes.
    pub async fn run<F>(self, shutdown: F) -> Result<LoopStats, SimError>
    where
        F: Future<Output = ()>,
    {
        let Self {
            mut simulator,
            driver,
        } = self;

        let inbox = simulator.client().notifier();
        let handle = driver.spawn();
        simulator.subscribe_control_topics()?;

        let mut scheduler = PublishScheduler::new(simulator.interval());
        tracing::info!(
            devices = simulator.registry().len(),
            interval_ms = scheduler.period().as_millis() as u64,
            "simulation started"
        );

        let stats = run_event_loop(&mut simulator, &mut scheduler, &inbox, shutdown).await;

        if let Err(e) = simulator.client().disconnect() {
            tracing::warn!(error = %e, "disconnect failed");
        }
        handle.abort();
        tracing::info!(ticks = stats.ticks, "simulation stopped");
        Ok(stats)
    }
}
