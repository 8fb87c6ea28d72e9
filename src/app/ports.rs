//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ RelayService / Bootstrap (domain)
//! ```
//!
//! Driven adapters (relay GPIO, radio, NVS, MQTT client, clocks) implement
//! these traits. The domain holds them as `Arc<dyn Port>` handles because
//! several threads (HTTP task, MQTT receive loop, provisioning worker,
//! main loop) share them.
//!
//! ## Security notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **StoragePort** implementations SHOULD encrypt sensitive keys.
//! - All port errors are typed: callers must handle every variant explicitly.

use std::sync::{Condvar, MutexGuard};
use std::time::Duration;

use crate::app::connectivity::ConnectivityState;
use crate::app::credentials::NetworkCredentials;
use crate::config::{AccessPointConfig, SystemConfig};

// ───────────────────────────────────────────────────────────────
// Relay driver port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// The "apply pin state" primitive.
///
/// Called once per mutated index after the state store has been updated.
/// Drive failures are the driver's to log; the store stays authoritative.
pub trait RelayDriver: Send {
    fn apply_pin_state(&mut self, index: usize, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / MQTT)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go (serial log, MQTT
/// status topic).
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Station port (driven adapter: domain → WiFi radio)
// ───────────────────────────────────────────────────────────────

/// Radio control used by the bootstrap orchestrator and the monitor.
///
/// Every call is non-blocking: outcomes arrive later as
/// [`NetEvent`](crate::events::NetEvent)s.
pub trait StationPort: Send {
    /// Configure station mode with `creds` and start associating.
    fn begin_station(&mut self, creds: &NetworkCredentials) -> Result<(), NetworkError>;

    /// Re-associate with the currently configured network.
    fn reconnect(&mut self) -> Result<(), NetworkError>;

    /// Bring up the self-hosted access point.
    fn start_access_point(&mut self, ap: &AccessPointConfig) -> Result<(), NetworkError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port (bounded waits without real time in tests)
// ───────────────────────────────────────────────────────────────

pub trait Clock: Send + Sync {
    /// Monotonic milliseconds since boot.
    fn now_ms(&self) -> u64;

    /// Block on `signal` for at most `timeout`, returning the re-acquired
    /// guard. Spurious wake-ups are allowed; callers re-check their
    /// predicate against [`now_ms`](Self::now_ms).
    fn park<'a>(
        &self,
        signal: &Condvar,
        guard: MutexGuard<'a, ConnectivityState>,
        timeout: Duration,
    ) -> MutexGuard<'a, ConnectivityState>;

    /// Whole seconds since boot.
    fn uptime_secs(&self) -> u64 {
        self.now_ms() / 1000
    }
}

// ───────────────────────────────────────────────────────────────
// System info port (heap telemetry for the status document)
// ───────────────────────────────────────────────────────────────

pub trait SystemInfo: Send + Sync {
    fn free_heap(&self) -> u32;

    /// Low-water mark since boot.
    fn min_free_heap(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// MQTT publisher port (driven adapter: domain → broker)
// ───────────────────────────────────────────────────────────────

pub trait MqttPublisher: Send {
    fn subscribe(&mut self, topic: &str) -> Result<(), MqttError>;
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), MqttError>;
}

// ───────────────────────────────────────────────────────────────
// Firmware update port (driven adapter: domain → OTA partition)
// ───────────────────────────────────────────────────────────────

/// Streaming firmware image writer.
///
/// `begin` → N × `write` → `finish`; `abort` discards a partial image.
pub trait FirmwareUpdatePort {
    fn begin(&mut self) -> Result<(), UpdateError>;
    /// Returns total bytes written so far.
    fn write(&mut self, chunk: &[u8]) -> Result<usize, UpdateError>;
    /// Validate the image and select it for the next boot.
    fn finish(&mut self) -> Result<(), UpdateError>;
    fn abort(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// # Security
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges should be rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for credentials and config blobs.
///
/// Shared between the bootstrap worker and the HTTP task, so every method
/// takes `&self`; implementations provide their own interior locking.
///
/// # Security
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic: no partial writes on power loss.
///   The ESP-IDF NVS API guarantees this natively per `nvs_commit()`.
pub trait StoragePort: Send + Sync {
    /// Read a value. Returns its full stored length; at most `buf.len()`
    /// bytes are copied, so a result larger than `buf` means truncation.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key. Returns `Ok(())` even if the key didn't exist.
    fn delete(&self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;

    /// Read a string-typed value. Same length contract as [`Self::read`],
    /// excluding any terminator.
    fn read_str(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.read(namespace, key, buf)
    }

    /// Write a string-typed value atomically.
    fn write_str(&self, namespace: &str, key: &str, value: &str) -> Result<(), StorageError> {
        self.write(namespace, key, value.as_bytes())
    }
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from the broadcast path)
// ───────────────────────────────────────────────────────────────

/// Callback trait that the scheduler invokes when a schedule fires.
pub trait SchedulerDelegate {
    /// * `label`: the human-readable label of the schedule that fired.
    fn on_schedule_fired(&mut self, label: &str);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// Stored bytes do not decode (bad UTF-8, oversized record).
    Corrupted,
}

/// Errors from [`StationPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    /// The driver rejected the SSID/password/AP parameters.
    InvalidConfiguration,
    /// Driver call failed with an ESP-IDF error code.
    Driver(i32),
}

/// Errors from [`MqttPublisher`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqttError {
    /// No broker session.
    NotConnected,
    /// Client call failed with an ESP-IDF error code.
    Client(i32),
}

/// Errors from [`FirmwareUpdatePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    AlreadyInProgress,
    NotStarted,
    NoPartition,
    WriteFailed,
    VerifyFailed,
    BootSetFailed,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::Corrupted => write!(f, "stored value corrupted"),
        }
    }
}

impl core::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidConfiguration => write!(f, "invalid network configuration"),
            Self::Driver(code) => write!(f, "WiFi driver error {}", code),
        }
    }
}

impl core::fmt::Display for MqttError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected to broker"),
            Self::Client(code) => write!(f, "MQTT client error {}", code),
        }
    }
}

impl core::fmt::Display for UpdateError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AlreadyInProgress => write!(f, "update already in progress"),
            Self::NotStarted => write!(f, "no update in progress"),
            Self::NoPartition => write!(f, "no inactive OTA partition available"),
            Self::WriteFailed => write!(f, "OTA write failed"),
            Self::VerifyFailed => write!(f, "OTA image verification failed"),
            Self::BootSetFailed => write!(f, "set boot partition failed"),
        }
    }
}
