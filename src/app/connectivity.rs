//! Connectivity monitor.
//!
//! Sole writer of [`ConnectivityState`]. Network-layer notifications arrive
//! as [`NetEvent`]s (via the event channel worker in production, directly in
//! tests) and update the link flag, the address, and the reconnect budget.
//!
//! ```text
//!   Connected(ip) ──▶ is_connected = true, address = ip, retries = 0
//!   Disconnected  ──▶ is_connected = false, address = None
//!                      └─ retries < max ? retries += 1, reconnect()
//!   RetryExhausted ─▶ is_connected = false, address = None, retries = max
//!   begin_attempt  ─▶ is_connected = false, address = None, retries = 0
//! ```
//!
//! The bootstrap orchestrator blocks in [`ConnectivityMonitor::wait_connected`],
//! a condition-variable wait bounded by an injected [`Clock`].

use std::net::Ipv4Addr;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{Clock, EventSink, StationPort};
use crate::events::NetEvent;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectivityState {
    pub is_connected: bool,
    /// Present iff `is_connected`.
    pub address: Option<Ipv4Addr>,
    /// Reconnects requested since the link was last up.
    pub failure_count: u32,
}

pub struct ConnectivityMonitor {
    state: Mutex<ConnectivityState>,
    signal: Condvar,
    station: Arc<Mutex<dyn StationPort>>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    max_retries: u32,
}

impl ConnectivityMonitor {
    pub fn new(
        station: Arc<Mutex<dyn StationPort>>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
        max_retries: u32,
    ) -> Self {
        Self {
            state: Mutex::new(ConnectivityState::default()),
            signal: Condvar::new(),
            station,
            clock,
            sink,
            max_retries,
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> ConnectivityState {
        self.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_connected
    }

    pub fn address(&self) -> Option<Ipv4Addr> {
        self.lock().address
    }

    /// Apply one network-layer event.
    pub fn handle_event(&self, event: NetEvent) {
        match event {
            NetEvent::Connected(addr) => {
                {
                    let mut state = self.lock();
                    state.is_connected = true;
                    state.address = Some(addr);
                    state.failure_count = 0;
                }
                self.signal.notify_all();
                info!("WiFi: got IP {}", addr);
                self.sink.emit(&AppEvent::LinkUp(addr));
            }
            NetEvent::Disconnected => {
                let retry = {
                    let mut state = self.lock();
                    state.is_connected = false;
                    state.address = None;
                    if state.failure_count < self.max_retries {
                        state.failure_count += 1;
                        Some(state.failure_count)
                    } else {
                        None
                    }
                };
                self.signal.notify_all();

                match retry {
                    Some(attempt) => {
                        info!(
                            "WiFi: disconnected, reconnect {}/{}",
                            attempt, self.max_retries
                        );
                        self.sink.emit(&AppEvent::LinkDown { retries: attempt });
                        // State lock is released: the radio may call back into us.
                        let result = self
                            .station
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .reconnect();
                        if let Err(e) = result {
                            warn!("WiFi: reconnect request failed: {}", e);
                        }
                    }
                    None => {
                        info!("WiFi: disconnected, retry budget exhausted");
                        self.sink.emit(&AppEvent::LinkDown {
                            retries: self.max_retries,
                        });
                    }
                }
            }
            NetEvent::RetryExhausted => {
                {
                    let mut state = self.lock();
                    state.is_connected = false;
                    state.address = None;
                    state.failure_count = self.max_retries;
                }
                self.signal.notify_all();
                warn!("WiFi: network layer gave up connecting");
                self.sink.emit(&AppEvent::LinkDown {
                    retries: self.max_retries,
                });
            }
        }
    }

    /// Reset link state before a fresh connection attempt.
    ///
    /// Starting association tears down any current link, so the attempt
    /// only succeeds on a `Connected` that arrives after this call.
    pub fn begin_attempt(&self) {
        let mut state = self.lock();
        if state.is_connected {
            info!("WiFi: dropping link {:?} for new attempt", state.address);
        }
        state.is_connected = false;
        state.address = None;
        state.failure_count = 0;
    }

    /// Block until the link is up or `timeout` elapses on the injected clock.
    ///
    /// Returns `true` iff connected at return time.
    pub fn wait_connected(&self, timeout: Duration) -> bool {
        let deadline = self.clock.now_ms() + timeout.as_millis() as u64;
        let mut state = self.lock();
        loop {
            if state.is_connected {
                return true;
            }
            let now = self.clock.now_ms();
            if now >= deadline {
                return false;
            }
            state = self
                .clock
                .park(&self.signal, state, Duration::from_millis(deadline - now));
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConnectivityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
