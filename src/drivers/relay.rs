//! Relay output driver.
//!
//! Six active-high GPIO outputs switch the relay coils through driver
//! transistors. The driver is generic over `embedded_hal::digital::OutputPin`
//! so the ESP-IDF `PinDriver` and host test pins share one code path.
//!
//! ## Init contract
//!
//! [`GpioRelayBank::new`] drives every output low before returning, so the
//! physical relays match the all-off state store from the first instant.

use embedded_hal::digital::OutputPin;
use log::{info, warn};

use crate::app::ports::RelayDriver;
use crate::config::RELAY_COUNT;

pub struct GpioRelayBank<P: OutputPin> {
    pins: [P; RELAY_COUNT],
    /// Drive failures since boot.
    faults: u32,
}

impl<P: OutputPin> GpioRelayBank<P> {
    pub fn new(pins: [P; RELAY_COUNT]) -> Self {
        let mut bank = Self { pins, faults: 0 };
        bank.all_off();
        info!("Relays: {} outputs initialised, all off", RELAY_COUNT);
        bank
    }

    pub fn all_off(&mut self) {
        for index in 0..RELAY_COUNT {
            self.drive(index, false);
        }
    }

    pub fn faults(&self) -> u32 {
        self.faults
    }

    fn drive(&mut self, index: usize, on: bool) {
        let Some(pin) = self.pins.get_mut(index) else {
            warn!("Relays: no output for index {}", index);
            return;
        };
        let result = if on { pin.set_high() } else { pin.set_low() };
        if let Err(e) = result {
            self.faults += 1;
            warn!("Relays: drive {} failed ({:?})", index, e);
        }
    }
}

impl<P: OutputPin + Send> RelayDriver for GpioRelayBank<P> {
    fn apply_pin_state(&mut self, index: usize, on: bool) {
        self.drive(index, on);
    }
}
