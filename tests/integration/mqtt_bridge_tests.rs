//! Integration tests for the MQTT surface: the bridge is both a command
//! source (`<root>/set`) and a broadcast sink (`<root>/status`).

use std::sync::Arc;

use serde_json::{Value, json};

use crate::mock_hw::{MockPublisher, MockRelayDriver, RecordingSink};

use relaynode::adapters::mqtt::{MqttBridge, MqttTopics};
use relaynode::app::ports::EventSink;
use relaynode::app::service::RelayService;

const STATUS: &str = "waveshare/relay/status";
const SET: &str = "waveshare/relay/set";

struct Harness {
    bridge: Arc<MqttBridge<MockPublisher>>,
    service: RelayService,
    publisher: MockPublisher,
    driver: MockRelayDriver,
}

fn harness() -> Harness {
    let publisher = MockPublisher::default();
    let bridge = Arc::new(MqttBridge::new(
        publisher.clone(),
        MqttTopics::new("waveshare/relay"),
    ));
    let driver = MockRelayDriver::new();
    let sinks: Vec<Arc<dyn EventSink>> = vec![RecordingSink::new(), bridge.clone()];
    let service = RelayService::new(Box::new(driver.clone()), sinks);
    Harness {
        bridge,
        service,
        publisher,
        driver,
    }
}

fn all_off() -> Value {
    json!({"0": false, "1": false, "2": false, "3": false, "4": false, "5": false})
}

#[test]
fn connect_subscribes_then_publishes_current_state() {
    let h = harness();

    h.bridge.on_connected(&h.service);

    assert!(h.bridge.is_connected());
    assert_eq!(*h.publisher.subscriptions.lock().unwrap(), vec![SET]);
    assert_eq!(h.publisher.published_on(STATUS), vec![all_off()]);
}

#[test]
fn set_topic_command_drives_relays_and_publishes() {
    let h = harness();
    h.bridge.on_connected(&h.service);

    h.bridge.on_message(SET, br#"{"1": true}"#, &h.service);

    assert_eq!(h.driver.writes(), vec![(1, true)]);
    let published = h.publisher.published_on(STATUS);
    assert_eq!(published.len(), 2);
    assert_eq!(published[1]["1"], Value::Bool(true));
    assert_eq!(published[1].as_object().unwrap().len(), 6);
    assert_eq!(h.bridge.published(), 2);
}

#[test]
fn other_topics_are_ignored() {
    let h = harness();
    h.bridge.on_connected(&h.service);

    h.bridge
        .on_message("waveshare/relay/config", br#"{"1": true}"#, &h.service);
    h.bridge.on_message(STATUS, br#"{"1": true}"#, &h.service);

    assert!(h.driver.writes().is_empty());
    assert_eq!(h.publisher.published_on(STATUS).len(), 1);
}

#[test]
fn malformed_mqtt_command_publishes_nothing() {
    let h = harness();
    h.bridge.on_connected(&h.service);

    h.bridge.on_message(SET, b"[1, 2]", &h.service);

    assert!(h.driver.writes().is_empty());
    assert_eq!(h.publisher.published_on(STATUS).len(), 1);
}

#[test]
fn offline_commands_apply_but_are_not_published() {
    let h = harness();

    // Commands from HTTP still work while the broker is away.
    h.service.apply_command(br#"{"0": true}"#).unwrap();
    h.service.broadcast_heartbeat();

    assert_eq!(h.service.relay(0), Some(true));
    assert!(h.publisher.published.lock().unwrap().is_empty());
}

#[test]
fn reconnect_republishes_latest_state() {
    let h = harness();
    h.bridge.on_connected(&h.service);
    h.bridge.on_disconnected();
    assert!(!h.bridge.is_connected());

    h.service.apply_command(br#"{"5": true}"#).unwrap();
    h.bridge.on_connected(&h.service);

    let published = h.publisher.published_on(STATUS);
    assert_eq!(published.len(), 2);
    assert_eq!(published[1]["5"], Value::Bool(true));
}

#[test]
fn heartbeat_reaches_the_status_topic() {
    let h = harness();
    h.bridge.on_connected(&h.service);

    h.service.broadcast_heartbeat();
    h.service.broadcast_heartbeat();

    assert_eq!(h.publisher.published_on(STATUS).len(), 3);
}
