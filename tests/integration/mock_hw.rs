//! Mock adapters for integration tests.
//!
//! Records every driver, radio and broker call so tests can assert on the
//! full history without touching real GPIO, WiFi or MQTT.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, Weak};
use std::time::Duration;

use relaynode::app::connectivity::{ConnectivityMonitor, ConnectivityState};
use relaynode::app::credentials::NetworkCredentials;
use relaynode::app::events::AppEvent;
use relaynode::app::ports::{
    Clock, EventSink, MqttError, MqttPublisher, NetworkError, RelayDriver, StationPort,
    StorageError, StoragePort, SystemInfo,
};
use relaynode::config::AccessPointConfig;
use relaynode::events::NetEvent;

pub const LEASED_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 50);

// ── MockRelayDriver ───────────────────────────────────────────

/// Pin writes in call order.
#[derive(Clone, Default)]
pub struct MockRelayDriver {
    pub writes: Arc<Mutex<Vec<(usize, bool)>>>,
}

impl MockRelayDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<(usize, bool)> {
        self.writes.lock().unwrap().clone()
    }
}

impl RelayDriver for MockRelayDriver {
    fn apply_pin_state(&mut self, index: usize, on: bool) {
        self.writes.lock().unwrap().push((index, on));
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<AppEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<AppEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Number of relay-state broadcasts (commands plus heartbeats).
    pub fn broadcasts(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.broadcast_snapshot().is_some())
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &AppEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ── ManualClock ───────────────────────────────────────────────

/// Virtual time: every park jumps straight to its timeout.
#[derive(Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn at(ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn park<'a>(
        &self,
        _signal: &Condvar,
        guard: MutexGuard<'a, ConnectivityState>,
        timeout: Duration,
    ) -> MutexGuard<'a, ConnectivityState> {
        self.advance(timeout.as_millis() as u64);
        guard
    }
}

// ── ScriptedStation ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    Station(String),
    Reconnect,
    AccessPoint(String),
}

/// Associates instantly with any SSID listed as reachable; everything else
/// stays silent until the caller's timeout.
#[derive(Clone, Default)]
pub struct ScriptedStation {
    pub monitor: Arc<OnceLock<Weak<ConnectivityMonitor>>>,
    pub reachable: Arc<Mutex<Vec<String>>>,
    pub calls: Arc<Mutex<Vec<RadioCall>>>,
}

impl ScriptedStation {
    pub fn reaching(ssids: &[&str]) -> Self {
        let station = Self::default();
        station.set_reachable(ssids);
        station
    }

    pub fn set_reachable(&self, ssids: &[&str]) {
        *self.reachable.lock().unwrap() = ssids.iter().map(|s| (*s).to_string()).collect();
    }

    /// Wire the station back to the monitor it reports to.
    pub fn attach(&self, monitor: &Arc<ConnectivityMonitor>) {
        let _ = self.monitor.set(Arc::downgrade(monitor));
    }

    pub fn calls(&self) -> Vec<RadioCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn station_attempts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RadioCall::Station(ssid) => Some(ssid),
                _ => None,
            })
            .collect()
    }

    pub fn ap_started(&self) -> bool {
        self.calls()
            .iter()
            .any(|c| matches!(c, RadioCall::AccessPoint(_)))
    }
}

impl StationPort for ScriptedStation {
    fn begin_station(&mut self, creds: &NetworkCredentials) -> Result<(), NetworkError> {
        let ssid = creds.ssid.to_string();
        self.calls.lock().unwrap().push(RadioCall::Station(ssid.clone()));
        if self.reachable.lock().unwrap().contains(&ssid) {
            if let Some(m) = self.monitor.get().and_then(Weak::upgrade) {
                m.handle_event(NetEvent::Connected(LEASED_IP));
            }
        }
        Ok(())
    }

    fn reconnect(&mut self) -> Result<(), NetworkError> {
        self.calls.lock().unwrap().push(RadioCall::Reconnect);
        Ok(())
    }

    fn start_access_point(&mut self, ap: &AccessPointConfig) -> Result<(), NetworkError> {
        self.calls
            .lock()
            .unwrap()
            .push(RadioCall::AccessPoint(ap.ssid.to_string()));
        Ok(())
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    store: Mutex<HashMap<String, Vec<u8>>>,
    fail_reads: Mutex<bool>,
}

impl MockNvs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every subsequent read reports an I/O error.
    pub fn break_reads(&self) {
        *self.fail_reads.lock().unwrap() = true;
    }

    pub fn raw(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        self.store
            .lock()
            .unwrap()
            .get(&format!("{}::{}", namespace, key))
            .cloned()
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        if *self.fail_reads.lock().unwrap() {
            return Err(StorageError::IoError);
        }
        let store = self.store.lock().unwrap();
        match store.get(&format!("{}::{}", namespace, key)) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(v.len())
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.store
            .lock()
            .unwrap()
            .insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store
            .lock()
            .unwrap()
            .remove(&format!("{}::{}", namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store
            .lock()
            .unwrap()
            .contains_key(&format!("{}::{}", namespace, key))
    }
}

// ── MockPublisher ─────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockPublisher {
    pub subscriptions: Arc<Mutex<Vec<String>>>,
    pub published: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl MockPublisher {
    pub fn published_on(&self, topic: &str) -> Vec<serde_json::Value> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| serde_json::from_slice(p).unwrap())
            .collect()
    }
}

impl MqttPublisher for MockPublisher {
    fn subscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        self.subscriptions.lock().unwrap().push(topic.to_string());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), MqttError> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_vec()));
        Ok(())
    }
}

// ── FixedSystemInfo ───────────────────────────────────────────

pub struct FixedSystemInfo(pub u32);

impl SystemInfo for FixedSystemInfo {
    fn free_heap(&self) -> u32 {
        self.0
    }

    fn min_free_heap(&self) -> u32 {
        self.0
    }
}
