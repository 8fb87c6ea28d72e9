//! System configuration parameters
//!
//! All tunable parameters for the relay node. Defaults match the shipped
//! Waveshare ESP32-S3-Relay-6CH build; values can be overridden via NVS.

use serde::{Deserialize, Serialize};

use crate::app::credentials::NetworkCredentials;

/// Number of relay channels on the board.
pub const RELAY_COUNT: usize = 6;

/// Reported in the status document.
pub const FIRMWARE_VERSION: &str = "1.0.0";

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub network: NetworkConfig,
    pub access_point: AccessPointConfig,
    pub mqtt: MqttConfig,
    pub http: HttpConfig,

    // --- Timing ---
    /// Main loop interval (milliseconds)
    pub loop_interval_ms: u32,
    /// Heartbeat status broadcast interval (seconds)
    pub status_interval_secs: u32,
    /// Free heap below this logs a low-memory warning (bytes)
    pub low_heap_warn_bytes: u32,
}

/// Station connection policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bound on each bootstrap tier's connection attempt (milliseconds)
    pub connect_timeout_ms: u32,
    /// Reconnects the monitor requests after a dropped link
    pub max_retries: u32,
}

/// Self-hosted access point used when no station network is reachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPointConfig {
    pub ssid: heapless::String<32>,
    /// Empty means an open network.
    pub password: heapless::String<64>,
    pub channel: u8,
    pub max_connections: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_url: heapless::String<96>,
    pub client_id: heapless::String<32>,
    /// Topics are `<root>/set`, `<root>/status`, `<root>/config`.
    pub topic_root: heapless::String<48>,
    pub keepalive_secs: u16,
    pub buffer_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub port: u16,
    /// POST bodies above this size are rejected before parsing.
    pub max_body_bytes: usize,
    pub stack_size: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            access_point: AccessPointConfig::default(),
            mqtt: MqttConfig::default(),
            http: HttpConfig::default(),

            // Timing
            loop_interval_ms: 1000,    // 1 Hz
            status_interval_secs: 30,  // heartbeat
            low_heap_warn_bytes: 10_000,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 15_000,
            max_retries: 5,
        }
    }
}

impl Default for AccessPointConfig {
    fn default() -> Self {
        Self {
            ssid: fixed("Waveshare-Relay-AP"),
            password: fixed("12345678"),
            channel: 1,
            max_connections: 4,
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_url: fixed("mqtt://192.168.1.138"),
            client_id: fixed("waveshare-relay-esp32s3"),
            topic_root: fixed("waveshare/relay"),
            keepalive_secs: 60,
            buffer_size: 1024,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 80,
            max_body_bytes: 1024,
            stack_size: 8192,
        }
    }
}

/// Compiled-in fallback station credentials (second bootstrap tier).
///
/// Set `RELAY_FALLBACK_SSID` / `RELAY_FALLBACK_PASSWORD` at build time.
/// An unset or empty SSID disables the tier.
pub fn fallback_credentials() -> Option<NetworkCredentials> {
    let ssid = option_env!("RELAY_FALLBACK_SSID").unwrap_or("");
    let password = option_env!("RELAY_FALLBACK_PASSWORD").unwrap_or("");
    if ssid.is_empty() {
        return None;
    }
    match NetworkCredentials::new(ssid, password) {
        Ok(creds) => Some(creds),
        Err(e) => {
            log::warn!("Config: ignoring compiled-in fallback credentials ({})", e);
            None
        }
    }
}

/// Truncating copy into a fixed-capacity string (defaults only).
fn fixed<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for ch in s.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}
