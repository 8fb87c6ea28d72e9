//! Fuzz target: `RelayService::apply_command`
//!
//! Feeds arbitrary bytes through the shared command path and verifies:
//! - No panics under any payload
//! - Every pin write the driver sees names a relay index below 6
//! - The store matches the last write for every index that was driven
//! - A refused payload (`Parse`) neither drives pins nor broadcasts
//!
//! cargo fuzz run fuzz_relay_command

#![no_main]

use std::sync::{Arc, Mutex};

use libfuzzer_sys::fuzz_target;
use relaynode::app::events::AppEvent;
use relaynode::app::ports::{EventSink, RelayDriver};
use relaynode::app::service::RelayService;
use relaynode::config::RELAY_COUNT;
use relaynode::error::CommandError;

#[derive(Clone, Default)]
struct Pins(Arc<Mutex<Vec<(usize, bool)>>>);

impl RelayDriver for Pins {
    fn apply_pin_state(&mut self, index: usize, on: bool) {
        self.0.lock().unwrap().push((index, on));
    }
}

#[derive(Default)]
struct Count(Mutex<usize>);

impl EventSink for Count {
    fn emit(&self, _event: &AppEvent) {
        *self.0.lock().unwrap() += 1;
    }
}

fuzz_target!(|data: &[u8]| {
    let pins = Pins::default();
    let broadcasts = Arc::new(Count::default());
    let sinks: Vec<Arc<dyn EventSink>> = vec![broadcasts.clone()];
    let service = RelayService::new(Box::new(pins.clone()), sinks);

    let result = service.apply_command(data);

    let writes = pins.0.lock().unwrap().clone();
    assert!(writes.iter().all(|(i, _)| *i < RELAY_COUNT));

    let snapshot = service.snapshot();
    for (i, state) in snapshot.iter().enumerate() {
        if let Some((_, last)) = writes.iter().rev().find(|(idx, _)| *idx == i) {
            assert_eq!(*state, *last, "store and pin disagree on relay {i}");
        } else {
            assert!(!state, "relay {i} changed without a pin write");
        }
    }

    if let Err(CommandError::Parse(_)) = result {
        assert!(writes.is_empty());
        assert_eq!(*broadcasts.0.lock().unwrap(), 0);
    }
});
