//! MQTT control surface.
//!
//! [`MqttBridge`] owns the topic layout and the broker session flag. It is
//! an [`EventSink`]: every broadcast event from the relay service becomes
//! a publish on `<root>/status`. Inbound traffic is pushed into it by the
//! receive loop.
//!
//! ```text
//!   broker ──▶ receive loop ──▶ on_connected    ─▶ subscribe <root>/set, publish status
//!                           ├─▶ on_disconnected ─▶ stop publishing
//!                           └─▶ on_message      ─▶ RelayService::apply_command
//!
//!   RelayService ──emit(RelaysChanged | Heartbeat)──▶ publish <root>/status
//! ```
//!
//! The relay service is passed into the inbound handlers rather than held,
//! since the service already holds the bridge as one of its sinks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, MqttError, MqttPublisher};
use crate::app::relays::RelaySnapshot;
use crate::app::service::RelayService;
use crate::app::status::encode_relays;

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    Details, EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS,
};

// ───────────────────────────────────────────────────────────────
// Topics
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttTopics {
    /// Inbound relay commands.
    pub set: String,
    /// Outbound relay map.
    pub status: String,
    /// Reserved.
    pub config: String,
}

impl MqttTopics {
    pub fn new(root: &str) -> Self {
        Self {
            set: format!("{root}/set"),
            status: format!("{root}/status"),
            config: format!("{root}/config"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Bridge
// ───────────────────────────────────────────────────────────────

pub struct MqttBridge<P: MqttPublisher> {
    publisher: Mutex<P>,
    topics: MqttTopics,
    connected: AtomicBool,
    published: AtomicU64,
}

impl<P: MqttPublisher> MqttBridge<P> {
    pub fn new(publisher: P, topics: MqttTopics) -> Self {
        Self {
            publisher: Mutex::new(publisher),
            topics,
            connected: AtomicBool::new(false),
            published: AtomicU64::new(0),
        }
    }

    pub fn topics(&self) -> &MqttTopics {
        &self.topics
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Status messages handed to the client since boot.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Broker session established: subscribe to commands, then publish status.
    pub fn on_connected(&self, service: &RelayService) {
        info!("MQTT: connected");
        self.connected.store(true, Ordering::Release);
        let result = self.lock().subscribe(&self.topics.set);
        match result {
            Ok(()) => info!("MQTT: subscribed to {}", self.topics.set),
            Err(e) => warn!("MQTT: subscribe to {} failed: {}", self.topics.set, e),
        }
        if let Err(e) = self.publish_status(&service.snapshot()) {
            warn!("MQTT: initial status publish failed: {}", e);
        }
    }

    pub fn on_disconnected(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            warn!("MQTT: disconnected");
        }
    }

    /// Route one complete inbound message.
    pub fn on_message(&self, topic: &str, payload: &[u8], service: &RelayService) {
        if topic != self.topics.set {
            debug!("MQTT: ignoring message on {}", topic);
            return;
        }
        info!("MQTT: command on {} ({} bytes)", topic, payload.len());
        if let Err(e) = service.apply_command(payload) {
            warn!("MQTT: command failed: {}", e);
        }
    }

    /// Publish the relay map on the status topic.
    pub fn publish_status(&self, relays: &RelaySnapshot) -> Result<(), MqttError> {
        if !self.is_connected() {
            return Err(MqttError::NotConnected);
        }
        let payload = encode_relays(relays);
        self.lock().publish(&self.topics.status, &payload)?;
        self.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, P> {
        self.publisher.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P: MqttPublisher> EventSink for MqttBridge<P> {
    fn emit(&self, event: &AppEvent) {
        let Some(relays) = event.broadcast_snapshot() else {
            return;
        };
        match self.publish_status(relays) {
            Ok(()) => {}
            Err(MqttError::NotConnected) => debug!("MQTT: offline, status not published"),
            Err(e) => warn!("MQTT: status publish failed: {}", e),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF client
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct EspMqttPublisher(EspMqttClient<'static>);

#[cfg(target_os = "espidf")]
impl MqttPublisher for EspMqttPublisher {
    fn subscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        self.0
            .subscribe(topic, QoS::AtMostOnce)
            .map(|_| ())
            .map_err(|e| MqttError::Client(e.code()))
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), MqttError> {
        // Enqueue: safe from the receive loop, which runs inside event dispatch.
        self.0
            .enqueue(topic, QoS::AtMostOnce, false, payload)
            .map(|_| ())
            .map_err(|e| MqttError::Client(e.code()))
    }
}

/// Create the client. The broker session comes up asynchronously.
#[cfg(target_os = "espidf")]
pub fn connect(
    cfg: &crate::config::MqttConfig,
) -> anyhow::Result<(EspMqttPublisher, EspMqttConnection)> {
    let conf = MqttClientConfiguration {
        client_id: Some(cfg.client_id.as_str()),
        keep_alive_interval: Some(std::time::Duration::from_secs(u64::from(cfg.keepalive_secs))),
        buffer_size: cfg.buffer_size,
        ..Default::default()
    };
    let (client, conn) = EspMqttClient::new(cfg.broker_url.as_str(), &conf)?;
    info!("MQTT: client started for {}", cfg.broker_url);
    Ok((EspMqttPublisher(client), conn))
}

/// Drain connection events until the client is dropped.
#[cfg(target_os = "espidf")]
pub fn run_receive_loop(
    mut conn: EspMqttConnection,
    bridge: &MqttBridge<EspMqttPublisher>,
    service: &RelayService,
) {
    loop {
        match conn.next() {
            Ok(event) => match event.payload() {
                EventPayload::Connected(_) => bridge.on_connected(service),
                EventPayload::Disconnected => bridge.on_disconnected(),
                EventPayload::Received {
                    topic: Some(topic),
                    data,
                    details: Details::Complete,
                    ..
                } => bridge.on_message(topic, data, service),
                EventPayload::Received { .. } => {
                    warn!("MQTT: dropping fragmented message");
                }
                _ => {}
            },
            Err(e) => {
                warn!("MQTT: connection closed ({:?})", e);
                bridge.on_disconnected();
                return;
            }
        }
    }
}
