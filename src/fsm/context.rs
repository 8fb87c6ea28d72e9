//! Shared mutable context threaded through every bootstrap phase handler.
//!
//! `BootstrapContext` holds the handles the phases need (credential store,
//! radio, connectivity monitor), the fixed policy (timeout, fallback
//! credentials, access point), and the bookkeeping of the current run.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::info;

use crate::app::connectivity::ConnectivityMonitor;
use crate::app::credentials::{CredentialStore, NetworkCredentials};
use crate::app::ports::StationPort;
use crate::config::{self, AccessPointConfig, SystemConfig};
use crate::error::Error;

// ---------------------------------------------------------------------------
// Policy (fixed for the life of the process)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BootstrapPolicy {
    /// Bound on each tier's wait for a connected event.
    pub connect_timeout: Duration,
    /// Second-tier credentials. `None` skips the tier.
    pub fallback: Option<NetworkCredentials>,
    pub access_point: AccessPointConfig,
}

impl BootstrapPolicy {
    /// Policy from config plus the compiled-in fallback credentials.
    pub fn from_config(cfg: &SystemConfig) -> Self {
        Self {
            connect_timeout: Duration::from_millis(u64::from(cfg.network.connect_timeout_ms)),
            fallback: config::fallback_credentials(),
            access_point: cfg.access_point.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

pub struct BootstrapContext {
    pub credentials: CredentialStore,
    pub station: Arc<Mutex<dyn StationPort>>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub policy: BootstrapPolicy,

    /// Credentials handed in by a direct re-entry. Consumed by the
    /// persisted tier instead of reading the store.
    pub direct: Option<NetworkCredentials>,
    /// Connection attempts started since boot (all tiers).
    pub attempts: u32,
    /// Why the most recent attempt failed.
    pub last_error: Option<Error>,
}

impl BootstrapContext {
    pub fn new(
        credentials: CredentialStore,
        station: Arc<Mutex<dyn StationPort>>,
        monitor: Arc<ConnectivityMonitor>,
        policy: BootstrapPolicy,
    ) -> Self {
        Self {
            credentials,
            station,
            monitor,
            policy,
            direct: None,
            attempts: 0,
            last_error: None,
        }
    }

    /// One bounded connection attempt: start association, then wait for
    /// the monitor to report a link or for the timeout to pass.
    pub fn attempt(&mut self, tier: &str, creds: &NetworkCredentials) -> Result<Ipv4Addr, Error> {
        self.attempts += 1;
        info!("Bootstrap: {} tier, connecting to '{}'", tier, creds.ssid);

        self.monitor.begin_attempt();
        self.station
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .begin_station(creds)?;

        if self.monitor.wait_connected(self.policy.connect_timeout) {
            Ok(self.monitor.address().unwrap_or(Ipv4Addr::UNSPECIFIED))
        } else {
            Err(Error::Timeout {
                waited_ms: self.policy.connect_timeout.as_millis() as u32,
            })
        }
    }

    /// Record a failed attempt.
    pub fn fail(&mut self, error: Error) {
        log::warn!("Bootstrap: attempt failed: {}", error);
        self.last_error = Some(error);
    }
}
