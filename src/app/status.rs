//! Status encoder.
//!
//! Two payloads leave the device:
//!
//! - the full status document served on `GET /status`
//! - the relay map published on the MQTT status topic
//!
//! ```text
//! {
//!   "relays": {"0": false, "1": true, ..., "5": false},
//!   "wifi_connected": true,
//!   "ip_address": "192.168.1.40",
//!   "free_heap": 183204,
//!   "uptime": 5120,
//!   "firmware_version": "1.0.0"
//! }
//! ```
//!
//! The relay map always carries every index, in index order.

use serde::{Serialize, Serializer};

use crate::app::connectivity::ConnectivityState;
use crate::app::relays::RelaySnapshot;
use crate::config::FIRMWARE_VERSION;

/// Shown in `ip_address` when the station has no address.
pub const NO_ADDRESS: &str = "N/A";

/// Serializes a snapshot as `{"0": bool, ..., "N-1": bool}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayMap(pub RelaySnapshot);

impl Serialize for RelayMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // serde_json writes integer map keys as quoted strings.
        serializer.collect_map(self.0.iter().enumerate())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusDocument {
    pub relays: RelayMap,
    pub wifi_connected: bool,
    pub ip_address: String,
    pub free_heap: u32,
    pub uptime: u64,
    pub firmware_version: &'static str,
}

impl StatusDocument {
    pub fn new(
        relays: RelaySnapshot,
        link: &ConnectivityState,
        free_heap: u32,
        uptime_secs: u64,
    ) -> Self {
        let ip_address = match (link.is_connected, link.address) {
            (true, Some(addr)) => addr.to_string(),
            _ => NO_ADDRESS.to_string(),
        };
        Self {
            relays: RelayMap(relays),
            wifi_connected: link.is_connected,
            ip_address,
            free_heap,
            uptime: uptime_secs,
            firmware_version: FIRMWARE_VERSION,
        }
    }

    pub fn to_json(&self) -> Vec<u8> {
        // Plain data with string keys; serialization cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// The MQTT status payload: just the relay map.
pub fn encode_relays(snapshot: &RelaySnapshot) -> Vec<u8> {
    serde_json::to_vec(&RelayMap(*snapshot)).unwrap_or_default()
}
