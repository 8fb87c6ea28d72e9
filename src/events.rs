//! Cross-task event channels.
//!
//! Network-layer callbacks (ESP-IDF system event loop) and control-surface
//! handlers never call into the domain directly. They push into bounded
//! `embassy-sync` channels that dedicated worker threads drain.
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐     ┌─────────────────────┐
//! │ sysloop WiFi/IP  │────▶│  NetEventQueue   │────▶│ ConnectivityMonitor │
//! │ subscriptions    │     │  (cap 8)         │     │ (net-events worker) │
//! └──────────────────┘     └──────────────────┘     └─────────────────────┘
//! ┌──────────────────┐     ┌──────────────────┐     ┌─────────────────────┐
//! │ HTTP POST /wifi  │────▶│  ProvisionQueue  │────▶│ Bootstrap::reenter  │
//! │                  │     │  (cap 2)         │     │ (provision worker)  │
//! └──────────────────┘     └──────────────────┘     └─────────────────────┘
//! ```
//!
//! Producers use `try_send` and never block; a full queue drops the event
//! with a warning.

use std::net::Ipv4Addr;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::connectivity::ConnectivityMonitor;
use crate::app::credentials::NetworkCredentials;

const NET_EVENT_QUEUE_CAP: usize = 8;
const PROVISION_QUEUE_CAP: usize = 2;

/// Network-layer notifications consumed by the connectivity monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetEvent {
    /// Station associated and obtained an address.
    Connected(Ipv4Addr),
    /// Station link dropped (or an association attempt failed).
    Disconnected,
    /// The network layer stopped retrying on its own.
    RetryExhausted,
}

pub type NetEventQueue = Channel<CriticalSectionRawMutex, NetEvent, NET_EVENT_QUEUE_CAP>;

/// Credential submissions awaiting direct bootstrap re-entry.
pub type ProvisionQueue =
    Channel<CriticalSectionRawMutex, NetworkCredentials, PROVISION_QUEUE_CAP>;

/// Non-blocking push from a callback context.
/// Returns `false` if the queue is full (event dropped).
pub fn push_net_event(queue: &NetEventQueue, event: NetEvent) -> bool {
    if queue.try_send(event).is_err() {
        warn!("Events: net event queue full, dropping {:?}", event);
        return false;
    }
    true
}

/// Worker loop: wait for events forever and forward them to the monitor.
pub fn run_net_event_worker(queue: &NetEventQueue, monitor: &ConnectivityMonitor) -> ! {
    loop {
        let event = futures_lite::future::block_on(queue.receive());
        monitor.handle_event(event);
    }
}
