//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::app::relays::RelaySnapshot;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

/// `"0:on 1:off ..."` for a snapshot.
fn describe(relays: &RelaySnapshot) -> String {
    relays
        .iter()
        .enumerate()
        .map(|(i, on)| format!("{}:{}", i, if *on { "on" } else { "off" }))
        .collect::<Vec<_>>()
        .join(" ")
}

impl EventSink for LogEventSink {
    fn emit(&self, event: &AppEvent) {
        match event {
            AppEvent::RelaysChanged(relays) => {
                info!("RELAY | {}", describe(relays));
            }
            AppEvent::Heartbeat(relays) => {
                info!("HEARTBEAT | {}", describe(relays));
            }
            AppEvent::PhaseChanged { from, to } => {
                info!("BOOT | {:?} -> {:?}", from, to);
            }
            AppEvent::LinkUp(addr) => {
                info!("LINK | up, ip={}", addr);
            }
            AppEvent::LinkDown { retries } => {
                warn!("LINK | down, retries={}", retries);
            }
        }
    }
}
