//! End-to-end provisioning: `POST /wifi` → provisioning queue → direct
//! bootstrap re-entry → persisted credentials.

use std::sync::Arc;

use crate::bootstrap_tests::{Rig, persist, rig};
use crate::mock_hw::{FixedSystemInfo, LEASED_IP, MockRelayDriver, RecordingSink};

use relaynode::adapters::http::{HttpApi, HttpMethod};
use relaynode::app::credentials::{CREDENTIAL_NAMESPACE, PASSWORD_KEY, SSID_KEY};
use relaynode::app::ports::EventSink;
use relaynode::app::service::RelayService;
use relaynode::events::ProvisionQueue;
use relaynode::fsm::BootstrapPhase;

fn api_for(r: &Rig, queue: &Arc<ProvisionQueue>) -> HttpApi {
    let sinks: Vec<Arc<dyn EventSink>> = vec![RecordingSink::new()];
    let service = Arc::new(RelayService::new(Box::new(MockRelayDriver::new()), sinks));
    HttpApi::new(
        service,
        r.monitor.clone(),
        Arc::new(FixedSystemInfo(200_000)),
        r.clock.clone(),
        queue.clone(),
        1024,
    )
}

#[test]
fn access_point_user_submits_working_credentials() {
    let mut r = rig(&["Attic"], None);
    let queue = Arc::new(ProvisionQueue::new());
    let api = api_for(&r, &queue);

    assert_eq!(r.bootstrap.run(), BootstrapPhase::HostAp);

    let resp = api.handle(
        HttpMethod::Post,
        "/wifi",
        br#"{"ssid": "Attic", "password": "attic-pass"}"#,
    );
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body_str(), "OK");

    assert_eq!(
        r.bootstrap.service_pending(&queue),
        Some(BootstrapPhase::Connected)
    );
    assert_eq!(r.monitor.address(), Some(LEASED_IP));
    assert_eq!(
        r.nvs.raw(CREDENTIAL_NAMESPACE, SSID_KEY).as_deref(),
        Some(&b"Attic"[..])
    );
    assert_eq!(
        r.nvs.raw(CREDENTIAL_NAMESPACE, PASSWORD_KEY).as_deref(),
        Some(&b"attic-pass"[..])
    );
    assert_eq!(r.bootstrap.service_pending(&queue), None, "queue drained");
}

#[test]
fn failed_submission_is_still_persisted_and_does_not_escalate() {
    let mut r = rig(&[], Some("Spare"));
    let queue = Arc::new(ProvisionQueue::new());
    let api = api_for(&r, &queue);
    r.bootstrap.run();
    let attempts_before = r.station.station_attempts().len();

    let resp = api.handle(
        HttpMethod::Post,
        "/wifi",
        br#"{"ssid": "Typo", "passphrase": "wrong-pass"}"#,
    );
    assert_eq!(resp.status, 200);

    assert_eq!(
        r.bootstrap.service_pending(&queue),
        Some(BootstrapPhase::TryPersisted)
    );
    let attempts = r.station.station_attempts();
    assert_eq!(attempts.len(), attempts_before + 1, "only the submitted tier runs");
    assert_eq!(attempts.last().map(String::as_str), Some("Typo"));
    assert_eq!(
        r.nvs.raw(CREDENTIAL_NAMESPACE, SSID_KEY).as_deref(),
        Some(&b"Typo"[..])
    );
}

#[test]
fn submission_replaces_previous_network() {
    let mut r = rig(&["Home", "Office"], None);
    persist(&r, "Home");
    let queue = Arc::new(ProvisionQueue::new());
    let api = api_for(&r, &queue);
    assert_eq!(r.bootstrap.run(), BootstrapPhase::Connected);

    api.handle(
        HttpMethod::Post,
        "/wifi",
        br#"{"ssid": "Office", "password": "office-pass"}"#,
    );

    assert_eq!(
        r.bootstrap.service_pending(&queue),
        Some(BootstrapPhase::Connected)
    );
    assert_eq!(r.station.station_attempts(), vec!["Home", "Office"]);

    // A reboot now starts from the new record.
    r.station.set_reachable(&["Office"]);
    assert_eq!(r.bootstrap.run(), BootstrapPhase::Connected);
    assert_eq!(r.station.station_attempts().last().map(String::as_str), Some("Office"));
}

#[test]
fn invalid_submissions_never_reach_the_queue() {
    let r = rig(&[], None);
    let queue = Arc::new(ProvisionQueue::new());
    let api = api_for(&r, &queue);

    let too_long = format!(r#"{{"ssid": "Home", "password": "{}"}}"#, "p".repeat(65));
    let cases: [&[u8]; 4] = [
        b"{not json",
        br#"{"ssid": "Home"}"#,
        br#"{"ssid": "", "password": "long-enough"}"#,
        too_long.as_bytes(),
    ];
    for body in cases {
        let resp = api.handle(HttpMethod::Post, "/wifi", body);
        assert_eq!(resp.status, 400, "{}", String::from_utf8_lossy(body));
    }
    assert!(queue.try_receive().is_err());
}

#[test]
fn short_passphrase_is_left_for_the_radio_to_judge() {
    let r = rig(&[], None);
    let queue = Arc::new(ProvisionQueue::new());
    let api = api_for(&r, &queue);

    let resp = api.handle(
        HttpMethod::Post,
        "/wifi",
        br#"{"ssid": "Shed", "password": "short"}"#,
    );

    assert_eq!(resp.status, 200);
    let queued = queue.try_receive().unwrap();
    assert_eq!(queued.ssid.as_str(), "Shed");
    assert_eq!(queued.password.as_str(), "short");
}

#[test]
fn full_queue_answers_busy() {
    let r = rig(&[], None);
    let queue = Arc::new(ProvisionQueue::new());
    let api = api_for(&r, &queue);
    let body = br#"{"ssid": "Home", "password": "home-pass"}"#;

    assert_eq!(api.handle(HttpMethod::Post, "/wifi", body).status, 200);
    assert_eq!(api.handle(HttpMethod::Post, "/wifi", body).status, 200);
    let resp = api.handle(HttpMethod::Post, "/wifi", body);

    assert_eq!(resp.status, 503);
    assert_eq!(resp.body_str(), "Provisioning busy, try again");
}
