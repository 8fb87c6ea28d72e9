//! Actuator state store.
//!
//! The in-memory relay vector is the single source of truth for what the
//! device believes each relay is doing. It starts all-off, matching the
//! driver's boot-time pin level, and every index always holds a value.
//!
//! Writes are crate-private: only the command path in
//! [`RelayService`](super::service::RelayService) mutates the store, and it
//! serializes whole commands. Readers take copy-on-read snapshots, so a
//! reader never observes a torn vector.

use std::sync::{Mutex, PoisonError};

use crate::config::RELAY_COUNT;

/// A point-in-time copy of every relay state, indexed by wire index.
pub type RelaySnapshot = [bool; RELAY_COUNT];

pub struct RelayBank {
    states: Mutex<RelaySnapshot>,
}

impl Default for RelayBank {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayBank {
    pub fn new() -> Self {
        Self {
            states: Mutex::new([false; RELAY_COUNT]),
        }
    }

    /// Copy of the whole vector.
    pub fn snapshot(&self) -> RelaySnapshot {
        *self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// State of one relay, `None` for an index past the bank.
    pub fn get(&self, index: usize) -> Option<bool> {
        self.snapshot().get(index).copied()
    }

    /// Set one relay. Returns the previous value. Out-of-range indices are
    /// a caller bug; the command parser range-checks first.
    pub(crate) fn set(&self, index: usize, on: bool) -> Option<bool> {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = states.get_mut(index)?;
        Some(core::mem::replace(slot, on))
    }
}
