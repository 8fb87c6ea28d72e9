//! Application service: the hexagonal core of the relay command path.
//!
//! [`RelayService`] owns the relay state store, the pin driver, and the
//! list of event sinks. Both control surfaces call
//! [`apply_command`](RelayService::apply_command); the main loop calls
//! [`broadcast_heartbeat`](RelayService::broadcast_heartbeat).
//!
//! ```text
//!  HTTP POST /relay ──┐   ┌────────────────────────┐ ──▶ RelayDriver
//!                     ├──▶│      RelayService      │
//!  MQTT <root>/set ───┘   │  parse · store · emit  │ ──▶ EventSink × N
//!                         └────────────────────────┘     (log, MQTT)
//! ```
//!
//! Commands are serialized: one command lock covers decode, validation,
//! mutation, pin drive and the broadcast, so two surfaces submitting at
//! once never interleave entry by entry and never lose an update.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::{info, warn};

use crate::error::CommandError;

use super::commands::parse_command;
use super::events::AppEvent;
use super::ports::{EventSink, RelayDriver};
use super::relays::{RelayBank, RelaySnapshot};

// ───────────────────────────────────────────────────────────────
// RelayService
// ───────────────────────────────────────────────────────────────

pub struct RelayService {
    bank: RelayBank,
    driver: Mutex<Box<dyn RelayDriver>>,
    sinks: Vec<Arc<dyn EventSink>>,
    command_lock: Mutex<()>,
    commands_applied: AtomicU64,
}

impl RelayService {
    pub fn new(driver: Box<dyn RelayDriver>, sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self {
            bank: RelayBank::new(),
            driver: Mutex::new(driver),
            sinks,
            command_lock: Mutex::new(()),
            commands_applied: AtomicU64::new(0),
        }
    }

    /// Decode and apply a relay command payload.
    ///
    /// Valid entries take effect even when others are rejected; the
    /// returned error lists the rejected ones. A broadcast follows when at
    /// least one entry applied or the payload was an empty object. A
    /// payload that is not a JSON object changes nothing.
    pub fn apply_command(&self, payload: &[u8]) -> Result<(), CommandError> {
        let _serial = self
            .command_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut decoded = parse_command(payload).map_err(|e| {
            warn!("Relay: rejected command ({})", e);
            CommandError::Parse(e)
        })?;

        for cmd in &decoded.entries {
            self.bank.set(cmd.index, cmd.on);
        }
        {
            let mut driver = self.driver.lock().unwrap_or_else(PoisonError::into_inner);
            for cmd in &decoded.entries {
                info!("Relay: {} -> {}", cmd.index, if cmd.on { "ON" } else { "OFF" });
                driver.apply_pin_state(cmd.index, cmd.on);
            }
        }

        let empty = decoded.is_empty();
        if empty || !decoded.entries.is_empty() {
            self.commands_applied.fetch_add(1, Ordering::Relaxed);
            self.emit(&AppEvent::RelaysChanged(self.bank.snapshot()));
        }

        if decoded.rejected.is_empty() {
            Ok(())
        } else {
            decoded.rejected.applied = decoded.entries.len();
            let err = CommandError::Rejected(decoded.rejected);
            warn!("Relay: {}", err);
            Err(err)
        }
    }

    /// Unconditional status broadcast (periodic publisher).
    pub fn broadcast_heartbeat(&self) {
        self.emit(&AppEvent::Heartbeat(self.bank.snapshot()));
    }

    /// Copy of every relay state.
    pub fn snapshot(&self) -> RelaySnapshot {
        self.bank.snapshot()
    }

    pub fn relay(&self, index: usize) -> Option<bool> {
        self.bank.get(index)
    }

    /// Commands that produced a broadcast since boot.
    pub fn commands_applied(&self) -> u64 {
        self.commands_applied.load(Ordering::Relaxed)
    }

    fn emit(&self, event: &AppEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
