//! Outbound application events.
//!
//! The [`RelayService`](super::service::RelayService), the bootstrap
//! orchestrator and the connectivity monitor emit these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other
//! side decide what to do with them: log to serial, publish over MQTT.

use std::net::Ipv4Addr;

use crate::app::relays::RelaySnapshot;
use crate::fsm::BootstrapPhase;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A relay command was applied (at least partly, or was an empty no-op).
    RelaysChanged(RelaySnapshot),

    /// Periodic unconditional status broadcast.
    Heartbeat(RelaySnapshot),

    /// The bootstrap orchestrator moved between phases.
    PhaseChanged {
        from: BootstrapPhase,
        to: BootstrapPhase,
    },

    /// The station obtained an address.
    LinkUp(Ipv4Addr),

    /// The station lost its link; `retries` reconnects requested so far.
    LinkDown { retries: u32 },
}

impl AppEvent {
    /// The relay snapshot to broadcast, if this event is a broadcast.
    pub fn broadcast_snapshot(&self) -> Option<&RelaySnapshot> {
        match self {
            Self::RelaysChanged(s) | Self::Heartbeat(s) => Some(s),
            _ => None,
        }
    }
}
