//! Integration tests for the command → relay store → driver → broadcast
//! pipeline shared by both control surfaces.

use std::sync::Arc;

use crate::mock_hw::{MockRelayDriver, RecordingSink};

use relaynode::app::events::AppEvent;
use relaynode::app::ports::EventSink;
use relaynode::app::service::RelayService;
use relaynode::error::{CommandError, FaultReason, ParseError};
use relaynode::scheduler::{HeartbeatPublisher, Schedule, Scheduler};

fn make_service() -> (RelayService, MockRelayDriver, Arc<RecordingSink>) {
    let driver = MockRelayDriver::new();
    let sink = RecordingSink::new();
    let sinks: Vec<Arc<dyn EventSink>> = vec![sink.clone()];
    let service = RelayService::new(Box::new(driver.clone()), sinks);
    (service, driver, sink)
}

#[test]
fn boots_with_every_relay_off() {
    let (service, driver, sink) = make_service();
    assert_eq!(service.snapshot(), [false; 6]);
    assert!(driver.writes().is_empty());
    assert!(sink.events().is_empty());
}

#[test]
fn valid_command_drives_pins_and_broadcasts_once() {
    let (service, driver, sink) = make_service();

    service.apply_command(br#"{"0": true, "3": true}"#).unwrap();

    assert_eq!(service.snapshot(), [true, false, false, true, false, false]);
    let mut writes = driver.writes();
    writes.sort_unstable();
    assert_eq!(writes, vec![(0, true), (3, true)]);
    assert_eq!(
        sink.events(),
        vec![AppEvent::RelaysChanged([true, false, false, true, false, false])]
    );
}

#[test]
fn partial_command_applies_valid_entries_and_reports_the_rest() {
    let (service, driver, sink) = make_service();

    let err = service
        .apply_command(br#"{"1": true, "9": true, "2": "on", "x": false}"#)
        .unwrap_err();

    let CommandError::Rejected(rejected) = err else {
        panic!("expected per-entry rejection, got {err:?}");
    };
    assert_eq!(rejected.applied, 1);
    assert_eq!(rejected.rejected, 3);
    let reasons: Vec<FaultReason> = rejected.faults.iter().map(|f| f.reason).collect();
    assert!(reasons.contains(&FaultReason::IndexOutOfRange));
    assert!(reasons.contains(&FaultReason::NotBoolean));
    assert!(reasons.contains(&FaultReason::MalformedIndex));

    assert_eq!(service.relay(1), Some(true));
    assert_eq!(driver.writes(), vec![(1, true)]);
    assert_eq!(sink.broadcasts(), 1, "partial success still broadcasts");
}

#[test]
fn only_invalid_entries_change_nothing() {
    let (service, driver, sink) = make_service();

    assert!(service.apply_command(br#"{"6": true, "-1": false}"#).is_err());

    assert_eq!(service.snapshot(), [false; 6]);
    assert!(driver.writes().is_empty());
    assert_eq!(sink.broadcasts(), 0);
}

#[test]
fn non_object_payload_is_refused_outright() {
    let (service, driver, sink) = make_service();

    for payload in [&b"not json"[..], b"[true, false]", b"42", b"\"0\""] {
        let err = service.apply_command(payload).unwrap_err();
        assert!(
            matches!(
                err,
                CommandError::Parse(ParseError::InvalidJson | ParseError::NotAnObject)
            ),
            "{payload:?} gave {err:?}"
        );
    }

    assert!(driver.writes().is_empty());
    assert_eq!(sink.broadcasts(), 0);
}

#[test]
fn empty_object_is_a_broadcasting_no_op() {
    let (service, driver, sink) = make_service();

    service.apply_command(b"{}").unwrap();

    assert!(driver.writes().is_empty());
    assert_eq!(sink.events(), vec![AppEvent::RelaysChanged([false; 6])]);
    assert_eq!(service.commands_applied(), 1);
}

#[test]
fn repeated_state_is_still_written() {
    let (service, driver, _sink) = make_service();

    service.apply_command(br#"{"5": true}"#).unwrap();
    service.apply_command(br#"{"5": true}"#).unwrap();

    assert_eq!(driver.writes(), vec![(5, true), (5, true)]);
}

#[test]
fn concurrent_commands_never_interleave_broadcasts() {
    let (service, _driver, sink) = make_service();
    let service = Arc::new(service);

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let service = service.clone();
            std::thread::spawn(move || {
                let payload = format!(r#"{{"{i}": true}}"#);
                service.apply_command(payload.as_bytes()).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(service.snapshot(), [true; 6]);
    assert_eq!(sink.broadcasts(), 6);
    // Each broadcast reflects at least as many ON relays as the one before.
    let on_counts: Vec<usize> = sink
        .events()
        .iter()
        .filter_map(|e| e.broadcast_snapshot().map(|s| s.iter().filter(|on| **on).count()))
        .collect();
    assert!(on_counts.windows(2).all(|w| w[0] < w[1]), "{on_counts:?}");
}

#[test]
fn heartbeat_fires_every_thirty_seconds_without_commands() {
    let (service, _driver, sink) = make_service();
    let mut sched = Scheduler::new();
    sched.add(Schedule::heartbeat(30)).unwrap();
    let mut publisher = HeartbeatPublisher::new(&service);

    for _ in 0..95 {
        sched.tick(1.0, &mut publisher);
    }

    assert_eq!(publisher.fired(), 3);
    let heartbeats = sink
        .events()
        .iter()
        .filter(|e| matches!(e, AppEvent::Heartbeat(_)))
        .count();
    assert_eq!(heartbeats, 3);
}

#[test]
fn repeated_index_applies_in_payload_order() {
    let (service, driver, sink) = make_service();

    service
        .apply_command(br#"{"3": true, "03": false}"#)
        .unwrap();

    assert_eq!(service.relay(3), Some(false));
    assert_eq!(driver.writes(), vec![(3, true), (3, false)]);
    assert_eq!(sink.broadcasts(), 1);
}
