//! Integration tests for the HTTP routes against a live relay service and
//! connectivity monitor.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::mock_hw::{FixedSystemInfo, ManualClock, MockRelayDriver, RecordingSink, ScriptedStation};

use relaynode::adapters::http::{CONTENT_JSON, CONTENT_TEXT, HttpApi, HttpMethod};
use relaynode::app::connectivity::ConnectivityMonitor;
use relaynode::app::ports::{EventSink, StationPort};
use relaynode::app::service::RelayService;
use relaynode::events::{NetEvent, ProvisionQueue};

struct Harness {
    api: HttpApi,
    service: Arc<RelayService>,
    monitor: Arc<ConnectivityMonitor>,
    driver: MockRelayDriver,
    sink: Arc<RecordingSink>,
}

fn harness() -> Harness {
    let driver = MockRelayDriver::new();
    let sink = RecordingSink::new();
    let sinks: Vec<Arc<dyn EventSink>> = vec![sink.clone()];
    let service = Arc::new(RelayService::new(Box::new(driver.clone()), sinks));

    let radio: Arc<Mutex<dyn StationPort>> = Arc::new(Mutex::new(ScriptedStation::default()));
    let clock = Arc::new(ManualClock::at(5_120_400));
    let monitor = Arc::new(ConnectivityMonitor::new(radio, clock.clone(), sink.clone(), 5));

    let api = HttpApi::new(
        service.clone(),
        monitor.clone(),
        Arc::new(FixedSystemInfo(183_204)),
        clock,
        Arc::new(ProvisionQueue::new()),
        1024,
    );
    Harness {
        api,
        service,
        monitor,
        driver,
        sink,
    }
}

fn status_json(h: &Harness) -> Value {
    let resp = h.api.handle(HttpMethod::Get, "/status", &[]);
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type, CONTENT_JSON);
    serde_json::from_slice(&resp.body).unwrap()
}

#[test]
fn status_document_while_offline() {
    let h = harness();
    let doc = status_json(&h);

    assert_eq!(doc["wifi_connected"], Value::Bool(false));
    assert_eq!(doc["ip_address"], "N/A");
    assert_eq!(doc["free_heap"], 183_204);
    assert_eq!(doc["uptime"], 5120);
    assert_eq!(doc["firmware_version"], "1.0.0");

    let relays = doc["relays"].as_object().unwrap();
    assert_eq!(relays.len(), 6);
    for i in 0..6 {
        assert_eq!(relays[&i.to_string()], Value::Bool(false));
    }
}

#[test]
fn status_reports_address_only_while_connected() {
    let h = harness();

    h.monitor
        .handle_event(NetEvent::Connected(Ipv4Addr::new(192, 168, 1, 40)));
    let doc = status_json(&h);
    assert_eq!(doc["wifi_connected"], Value::Bool(true));
    assert_eq!(doc["ip_address"], "192.168.1.40");

    h.monitor.handle_event(NetEvent::Disconnected);
    let doc = status_json(&h);
    assert_eq!(doc["wifi_connected"], Value::Bool(false));
    assert_eq!(doc["ip_address"], "N/A");
}

#[test]
fn relay_post_then_status_reflects_change() {
    let h = harness();

    let resp = h
        .api
        .handle(HttpMethod::Post, "/relay", br#"{"2": true, "4": true}"#);
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body_str(), "OK");

    let doc = status_json(&h);
    assert_eq!(doc["relays"]["2"], Value::Bool(true));
    assert_eq!(doc["relays"]["4"], Value::Bool(true));
    assert_eq!(doc["relays"]["0"], Value::Bool(false));
    assert_eq!(h.sink.broadcasts(), 1);
}

#[test]
fn relay_post_partial_success_is_a_400_naming_the_bad_entry() {
    let h = harness();

    let resp = h
        .api
        .handle(HttpMethod::Post, "/relay", br#"{"0": true, "7": true}"#);

    assert_eq!(resp.status, 400);
    assert_eq!(resp.content_type, CONTENT_TEXT);
    assert!(resp.body_str().contains("\"7\""), "{}", resp.body_str());
    assert_eq!(h.service.relay(0), Some(true), "valid entry still applied");
    assert_eq!(h.driver.writes(), vec![(0, true)]);
}

#[test]
fn relay_post_with_garbage_changes_nothing() {
    let h = harness();

    let resp = h.api.handle(HttpMethod::Post, "/relay", b"relay 1 on");

    assert_eq!(resp.status, 400);
    assert_eq!(resp.body_str(), "invalid JSON");
    assert!(h.driver.writes().is_empty());
    assert_eq!(h.sink.broadcasts(), 0);
}

#[test]
fn oversized_body_is_rejected_before_parsing() {
    let h = harness();
    let body = vec![b' '; 1025];

    assert!(h.api.check_body_len(1024).is_ok());
    assert!(h.api.check_body_len(1025).is_err());

    let resp = h.api.handle(HttpMethod::Post, "/relay", &body);
    assert_eq!(resp.status, 413);
    assert!(h.driver.writes().is_empty());
}

#[test]
fn query_string_is_ignored_for_routing() {
    let h = harness();
    let resp = h.api.handle(HttpMethod::Get, "/status?verbose=1", &[]);
    assert_eq!(resp.status, 200);
}

#[test]
fn ota_routes_are_placeholders() {
    let h = harness();

    let page = h.api.handle(HttpMethod::Get, "/ota", &[]);
    assert_eq!(page.status, 200);
    assert_eq!(page.body_str(), "OTA update page");

    let upload = h.api.handle(HttpMethod::Post, "/ota", b"\x00\x01");
    assert_eq!(upload.status, 501);
}

#[test]
fn unknown_routes_are_404() {
    let h = harness();
    assert_eq!(h.api.handle(HttpMethod::Get, "/relay", &[]).status, 404);
    assert_eq!(h.api.handle(HttpMethod::Post, "/status", b"{}").status, 404);
    assert_eq!(h.api.handle(HttpMethod::Get, "/", &[]).status, 404);
}
